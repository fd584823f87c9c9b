//! Compiled rule bundle.
//!
//! A [`CompiledBundle`] is the immutable, indexed form of a validated rule
//! set: hash maps for path and value lookups, ordered prefix and range
//! lists, the signature table and the mapping tables. Compilation is
//! deterministic and carries a content fingerprint.

mod tables;

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

pub use tables::{
    Classified, CompiledDerived, CompiledSignature, CompiledTransform, MappingTarget,
    NumericClass, PathClass, ShapeClass,
};

use crate::core::constants::{MAX_TOKEN_LEN, RULE_FORMAT_VERSION};
use crate::domain::rules::{
    CompileError, ResolvedRules, RuleIssue, RuleSet, RuleWarning, ValidationMode,
    ValidationReport, load_dir, resolve, validate,
};
use crate::domain::transforms::TransformSpec;
use crate::domain::types::{ConventionId, FieldTypeId, Section, TransformId};
use crate::utils::crypto::{sha256_hex_parts, short_hex};
use crate::utils::string::{path_suffixes, starts_with_ascii_ignore_case};

// =============================================================================
// Entry Points
// =============================================================================

/// Load, validate and compile every rule document in `dir`.
pub fn compile_dir(dir: &Path, mode: ValidationMode) -> Result<CompiledBundle, CompileError> {
    let outcome = load_dir(dir)?;
    let bundle = compile_with_issues(&outcome.rules, mode, outcome.issues)?;
    tracing::debug!(
        dir = %dir.display(),
        fingerprint = %bundle.fingerprint(),
        conventions = bundle.signatures.len(),
        "Compiled rule bundle"
    );
    Ok(bundle)
}

fn compile_with_issues(
    rules: &RuleSet,
    mode: ValidationMode,
    mut issues: Vec<RuleIssue>,
) -> Result<CompiledBundle, CompileError> {
    let (resolved, report) = resolve(rules);
    issues.extend(report.errors);
    let warnings = ValidationReport {
        errors: issues,
        warnings: report.warnings,
    }
    .into_result(mode)?;
    log_warnings(&warnings);
    Ok(CompiledBundle::from_resolved(resolved))
}

fn log_warnings(warnings: &[RuleWarning]) {
    for warning in warnings {
        tracing::warn!(%warning, "Rule set warning");
    }
}

// =============================================================================
// Compiled Bundle
// =============================================================================

/// Immutable, indexed rule set
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBundle {
    format_version: u32,
    fingerprint: String,
    cache_salt: u64,
    field_types: Vec<String>,
    field_type_ids: FxHashMap<String, FieldTypeId>,
    paths: FxHashMap<String, PathClass>,
    values: FxHashMap<String, Classified>,
    prefixes: Vec<(String, Classified)>,
    numeric: Vec<NumericClass>,
    shapes: Vec<ShapeClass>,
    signatures: Vec<CompiledSignature>,
    signature_fields: FxHashSet<String>,
    defaults: FxHashMap<FieldTypeId, MappingTarget>,
    overrides: FxHashMap<(ConventionId, FieldTypeId), MappingTarget>,
    derived: Vec<CompiledDerived>,
    transforms: Vec<CompiledTransform>,
}

impl CompiledBundle {
    /// Validate and compile a loaded rule set.
    pub fn compile(rules: &RuleSet, mode: ValidationMode) -> Result<Self, CompileError> {
        compile_with_issues(rules, mode, Vec::new())
    }

    /// Compile the rule documents embedded in the crate.
    pub fn builtin() -> Result<Self, CompileError> {
        Self::compile(&RuleSet::builtin()?, ValidationMode::Permissive)
    }

    fn from_resolved(resolved: ResolvedRules) -> Self {
        let signature_fields = resolved
            .signatures
            .iter()
            .flat_map(|s| s.required.iter().chain(&s.optional))
            .cloned()
            .collect();

        let mut bundle = Self {
            format_version: RULE_FORMAT_VERSION,
            fingerprint: String::new(),
            cache_salt: 0,
            field_types: resolved.field_types,
            field_type_ids: resolved.field_type_ids,
            paths: resolved.paths,
            values: resolved.values,
            prefixes: resolved.prefixes,
            numeric: resolved.numeric,
            shapes: resolved.shapes,
            signatures: resolved.signatures,
            signature_fields,
            defaults: resolved.defaults,
            overrides: resolved.overrides,
            derived: resolved.derived,
            transforms: resolved.transforms,
        };
        bundle.fingerprint = sha256_hex_parts(bundle.canonical_lines().iter().map(String::as_str));
        bundle.cache_salt = u64::from_str_radix(short_hex(&bundle.fingerprint, 16), 16).unwrap_or_default();
        bundle
    }

    /// Deterministic encoding of every table; hash-map content is sorted.
    fn canonical_lines(&self) -> Vec<String> {
        let type_name = |id: FieldTypeId| self.field_type_name(id);
        let transform_name = |id: TransformId| {
            self.transforms
                .get(id.index())
                .map_or("", |t| t.name.as_str())
        };
        let target_line = |t: &MappingTarget| {
            format!(
                "{}.{} via {} collect={}",
                t.section,
                t.field,
                transform_name(t.transform),
                t.collect
            )
        };

        let mut lines = vec![format!("version {}", self.format_version)];
        lines.extend(self.field_types.iter().map(|t| format!("type {t}")));

        let mut paths: Vec<String> = self
            .paths
            .iter()
            .map(|(path, pc)| {
                format!(
                    "path {path} {} {:?} capture={}",
                    type_name(pc.class.field_type),
                    pc.class.confidence,
                    pc.capture
                )
            })
            .collect();
        paths.sort_unstable();
        lines.extend(paths);

        let mut values: Vec<String> = self
            .values
            .iter()
            .map(|(token, c)| format!("value {token} {} {:?}", type_name(c.field_type), c.confidence))
            .collect();
        values.sort_unstable();
        lines.extend(values);

        lines.extend(self.prefixes.iter().map(|(prefix, c)| {
            format!("prefix {prefix} {} {:?}", type_name(c.field_type), c.confidence)
        }));
        lines.extend(self.numeric.iter().map(|n| {
            format!(
                "numeric {:?} {:?} {:?} {} {:?}",
                n.min,
                n.max,
                n.integer,
                type_name(n.class.field_type),
                n.class.confidence
            )
        }));
        lines.extend(self.shapes.iter().map(|s| {
            format!(
                "shape {:?} {} {} {:?}",
                s.required_keys,
                s.key,
                type_name(s.class.field_type),
                s.class.confidence
            )
        }));
        lines.extend(self.signatures.iter().map(|s| {
            format!(
                "signature {} {:?} {:?} {:?} {:?}",
                s.name, s.required, s.optional, s.required_weight, s.optional_weight
            )
        }));

        let mut defaults: Vec<String> = self
            .defaults
            .iter()
            .map(|(ty, t)| format!("map {} -> {}", type_name(*ty), target_line(t)))
            .collect();
        defaults.sort_unstable();
        lines.extend(defaults);

        let mut overrides: Vec<String> = self
            .overrides
            .iter()
            .map(|((conv, ty), t)| {
                format!(
                    "override {}/{} -> {}",
                    self.convention_name(*conv),
                    type_name(*ty),
                    target_line(t)
                )
            })
            .collect();
        overrides.sort_unstable();
        lines.extend(overrides);

        lines.extend(self.derived.iter().map(|d| {
            let sources: Vec<&str> = d.sources.iter().map(|s| type_name(*s)).collect();
            format!(
                "derived {}.{} {:?} {:?} unless={}",
                d.section,
                d.field,
                d.aggregate,
                sources,
                d.unless_present.map_or("", type_name)
            )
        }));
        lines.extend(
            self.transforms
                .iter()
                .map(|t| format!("transform {} {:?}", t.name, t.spec)),
        );
        lines
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// sha256 hex of the canonical encoding
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Fingerprint prefix as an integer, for cache keys
    pub fn cache_salt(&self) -> u64 {
        self.cache_salt
    }

    // -------------------------------------------------------------------------
    // Field types
    // -------------------------------------------------------------------------

    pub fn field_type_name(&self, id: FieldTypeId) -> &str {
        self.field_types
            .get(id.index())
            .map_or(crate::core::constants::UNKNOWN_FIELD_TYPE, String::as_str)
    }

    pub fn field_type_id(&self, name: &str) -> Option<FieldTypeId> {
        self.field_type_ids.get(name).copied()
    }

    // -------------------------------------------------------------------------
    // Classification
    // -------------------------------------------------------------------------

    /// Longest path-suffix rule matching a schema path
    pub fn match_path(&self, schema_path: &str) -> Option<&PathClass> {
        path_suffixes(schema_path).find_map(|suffix| self.paths.get(suffix))
    }

    /// Case-insensitive value-set membership
    pub fn match_value(&self, s: &str) -> Option<Classified> {
        let token = s.trim();
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return None;
        }
        if token.bytes().any(|b| b.is_ascii_uppercase()) || !token.is_ascii() {
            self.values.get(&token.to_lowercase()).copied()
        } else {
            self.values.get(token).copied()
        }
    }

    /// First prefix rule matching a string (case-insensitive)
    pub fn match_prefix(&self, s: &str) -> Option<Classified> {
        self.prefixes
            .iter()
            .find(|(prefix, _)| starts_with_ascii_ignore_case(s, prefix))
            .map(|(_, class)| *class)
    }

    /// First numeric range rule matching a number
    pub fn match_number(&self, n: &Number) -> Option<Classified> {
        self.numeric.iter().find(|r| r.matches(n)).map(|r| r.class)
    }

    /// Shape rules that fire for the children of `map`, as `(key, class)`
    pub fn shape_hints<'a>(
        &'a self,
        map: &'a Map<String, JsonValue>,
    ) -> impl Iterator<Item = (&'a str, Classified)> + 'a {
        self.shapes
            .iter()
            .filter(move |s| s.matches(map))
            .map(|s| (s.key.as_str(), s.class))
    }

    pub fn has_shape_rules(&self) -> bool {
        !self.shapes.is_empty()
    }

    // -------------------------------------------------------------------------
    // Signatures
    // -------------------------------------------------------------------------

    pub fn signatures(&self) -> &[CompiledSignature] {
        &self.signatures
    }

    pub fn convention_name(&self, id: ConventionId) -> &str {
        self.signatures.get(id.index()).map_or("", |s| s.name.as_str())
    }

    pub fn convention_id(&self, name: &str) -> Option<ConventionId> {
        self.signatures
            .iter()
            .position(|s| s.name == name)
            .and_then(|idx| u16::try_from(idx).ok())
            .map(ConventionId)
    }

    /// Whether any signature lists this path
    pub fn signature_mentions(&self, path: &str) -> bool {
        self.signature_fields.contains(path)
    }

    // -------------------------------------------------------------------------
    // Mappings
    // -------------------------------------------------------------------------

    /// Override for `(convention, type)` first, then the default for `type`
    pub fn mapping_for(
        &self,
        convention: Option<ConventionId>,
        field_type: FieldTypeId,
    ) -> Option<&MappingTarget> {
        convention
            .and_then(|conv| self.overrides.get(&(conv, field_type)))
            .or_else(|| self.defaults.get(&field_type))
    }

    /// Section of the default mapping for a type
    pub fn default_section(&self, field_type: FieldTypeId) -> Option<Section> {
        self.defaults.get(&field_type).map(|t| t.section)
    }

    pub fn derived(&self) -> &[CompiledDerived] {
        &self.derived
    }

    pub fn transform(&self, id: TransformId) -> Option<&CompiledTransform> {
        self.transforms.get(id.index())
    }

    /// Apply a unary transform; `None` when it does not support the value
    pub fn apply_transform(&self, id: TransformId, value: &JsonValue) -> Option<JsonValue> {
        match &self.transform(id)?.spec {
            TransformSpec::Unary(t) => t.apply(value),
            TransformSpec::Aggregate(_) => None,
        }
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            format_version: self.format_version,
            fingerprint: self.fingerprint.clone(),
            field_types: self.field_types.len(),
            path_rules: self.paths.len(),
            value_tokens: self.values.len(),
            prefixes: self.prefixes.len(),
            numeric_rules: self.numeric.len(),
            shape_rules: self.shapes.len(),
            conventions: self.signatures.iter().map(|s| s.name.clone()).collect(),
            mappings: self.defaults.len(),
            overrides: self.overrides.len(),
            derived: self.derived.len(),
            transforms: self.transforms.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Counts and names describing a compiled bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleSummary {
    pub format_version: u32,
    pub fingerprint: String,
    pub field_types: usize,
    pub path_rules: usize,
    pub value_tokens: usize,
    pub prefixes: usize,
    pub numeric_rules: usize,
    pub shape_rules: usize,
    pub conventions: Vec<String>,
    pub mappings: usize,
    pub overrides: usize,
    pub derived: usize,
    pub transforms: Vec<String>,
}

/// Report every load and validation issue without compiling.
pub fn check_dir(dir: &Path) -> Result<ValidationReport, CompileError> {
    let outcome = load_dir(dir)?;
    let mut report = validate(&outcome.rules);
    let mut errors = outcome.issues;
    errors.append(&mut report.errors);
    report.errors = errors;
    Ok(report)
}

#[cfg(test)]
#[path = "compile_tests.rs"]
mod tests;
