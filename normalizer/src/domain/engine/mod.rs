//! Normalizer engine.
//!
//! Holds the active rule bundle behind an `Arc` swap and a per-instance
//! plan cache. Normalization is synchronous and never fails: every
//! per-record condition degrades into `unmapped` fields and diagnostics.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::{Map, Value as JsonValue};

use crate::core::config::CacheConfig;
use crate::core::constants::{DEFAULT_UNMAPPED_WARN_RATIO, NON_OBJECT_ROOT_KEY};
use crate::data::cache::{CacheStats, MemoCache, PlanKey};
use crate::domain::compile::{CompiledBundle, compile_dir};
use crate::domain::detection::detect;
use crate::domain::discovery::{DiscoveryLimits, build_index, classify, walk};
use crate::domain::mapping::map_fields;
use crate::domain::rules::{CompileError, ValidationMode};
use crate::domain::types::{Classification, ConventionMatch, Diagnostics, NormalizedEvent};
use crate::utils::crypto::short_hex;

/// Tuning knobs of a [`Normalizer`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub limits: DiscoveryLimits,
    pub cache: CacheConfig,
    /// Share of unmapped fields above which a record is logged
    pub unmapped_warn_ratio: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limits: DiscoveryLimits::default(),
            cache: CacheConfig::default(),
            unmapped_warn_ratio: DEFAULT_UNMAPPED_WARN_RATIO,
        }
    }
}

/// Classification and detection for one record structure
#[derive(Debug)]
struct CachedPlan {
    classifications: Vec<Classification>,
    convention: ConventionMatch,
}

/// Span attribute normalizer
pub struct Normalizer {
    bundle: RwLock<Arc<CompiledBundle>>,
    generation: AtomicU64,
    plans: MemoCache<PlanKey, Arc<CachedPlan>>,
    limits: DiscoveryLimits,
    unmapped_warn_ratio: f64,
}

impl Normalizer {
    pub fn new(bundle: CompiledBundle, options: EngineOptions) -> Self {
        let plans = MemoCache::new(&options.cache).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Plan cache disabled");
            MemoCache::disabled()
        });
        tracing::debug!(
            fingerprint = short_hex(bundle.fingerprint(), 12),
            cache = plans.is_enabled(),
            "Normalizer ready"
        );
        Self {
            bundle: RwLock::new(Arc::new(bundle)),
            generation: AtomicU64::new(1),
            plans,
            limits: options.limits,
            unmapped_warn_ratio: options.unmapped_warn_ratio,
        }
    }

    /// Normalizer over the embedded rules
    pub fn with_builtin_rules(options: EngineOptions) -> Result<Self, CompileError> {
        Ok(Self::new(CompiledBundle::builtin()?, options))
    }

    /// Normalizer over a rule directory
    pub fn from_dir(dir: &Path, mode: ValidationMode, options: EngineOptions) -> Result<Self, CompileError> {
        Ok(Self::new(compile_dir(dir, mode)?, options))
    }

    /// Snapshot of the active bundle
    pub fn bundle(&self) -> Arc<CompiledBundle> {
        self.bundle.read().clone()
    }

    /// Bumped on every successful install
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.plans.stats()
    }

    /// Install a new bundle. In-flight records finish on the old one.
    pub fn replace(&self, bundle: CompiledBundle) -> u64 {
        let next = Arc::new(bundle);
        let previous = std::mem::replace(&mut *self.bundle.write(), Arc::clone(&next));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        // plan keys carry the bundle salt; this only frees memory
        self.plans.invalidate_all();
        tracing::info!(
            generation,
            fingerprint = short_hex(next.fingerprint(), 12),
            previous = short_hex(previous.fingerprint(), 12),
            "Rule bundle installed"
        );
        generation
    }

    /// Recompile `dir` and swap it in. On failure the active bundle stays.
    pub fn reload(&self, dir: &Path, mode: ValidationMode) -> Result<u64, CompileError> {
        match compile_dir(dir, mode) {
            Ok(bundle) => Ok(self.replace(bundle)),
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    issues = e.issues().len(),
                    "Rule reload failed, keeping active bundle"
                );
                Err(e)
            }
        }
    }

    /// Normalize one attribute map
    pub fn normalize(&self, attributes: &Map<String, JsonValue>) -> NormalizedEvent {
        let bundle = self.bundle();
        let walked = walk(&bundle, attributes, &self.limits);
        let key = PlanKey::new(bundle.cache_salt(), walked.signature);

        let plan = match self.plans.get(&key) {
            Some(plan) if plan.classifications.len() == walked.leaves.len() => plan,
            _ => {
                let classifications = classify(&bundle, &walked, &self.limits);
                let convention = detect(&bundle, &walked.paths);
                let plan = Arc::new(CachedPlan {
                    classifications,
                    convention,
                });
                self.plans.insert(key, Arc::clone(&plan));
                plan
            }
        };

        let index = build_index(&bundle, walked, &plan.classifications);
        let convention = &plan.convention;
        let mapped = map_fields(&bundle, &index, convention);

        let total = mapped.mapped + mapped.unmapped;
        if total > 0 {
            let ratio = mapped.unmapped as f64 / total as f64;
            if ratio > self.unmapped_warn_ratio {
                tracing::warn!(
                    convention = %convention.name,
                    unmapped = mapped.unmapped,
                    total,
                    ratio,
                    "Most fields left unmapped"
                );
            }
        }
        if convention.is_synthetic() && !index.is_empty() {
            tracing::warn!(
                convention = %convention.name,
                confidence = convention.confidence,
                "No known convention matched, using synthetic identity"
            );
        }
        tracing::trace!(
            convention = %convention.name,
            fields = index.len(),
            mapped = mapped.mapped,
            derived = mapped.derived,
            "Record normalized"
        );

        NormalizedEvent {
            diagnostics: Diagnostics {
                convention: convention.name.clone(),
                confidence: convention.confidence,
                synthetic: convention.is_synthetic(),
                signature_hash: convention.signature_hash.clone(),
                mapped_fields: mapped.mapped,
                unmapped_fields: mapped.unmapped,
                derived_fields: mapped.derived,
                truncated: index.truncated,
                bundle_fingerprint: bundle.fingerprint().to_string(),
            },
            event: mapped.event,
        }
    }

    /// Normalize any JSON value; a non-object lands in `unmapped["$"]`
    pub fn normalize_value(&self, value: &JsonValue) -> NormalizedEvent {
        match value {
            JsonValue::Object(attributes) => self.normalize(attributes),
            other => {
                let mut normalized = self.normalize(&Map::new());
                normalized.event.push_unmapped(NON_OBJECT_ROOT_KEY, other.clone());
                normalized.diagnostics.unmapped_fields += 1;
                normalized
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
