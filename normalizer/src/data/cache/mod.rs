//! Bounded memo cache
//!
//! Wraps a synchronous moka cache with hit/miss counters. A disabled
//! cache keeps the same API and always misses, so callers have a single
//! code path.

mod error;
mod key;

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::policy::EvictionPolicy as MokaEvictionPolicy;
use moka::sync::Cache;
use serde::Serialize;

pub use error::CacheError;
pub use key::{PlanKey, Signature, SignatureHasher};

use crate::core::config::{CacheConfig, EvictionPolicy};

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-memory memo cache with LRU or TinyLFU eviction and optional TTL
pub struct MemoCache<K, V> {
    cache: Option<Cache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Build a cache from configuration. A disabled config yields a cache that always misses.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        if !config.enabled {
            tracing::debug!("Plan cache disabled");
            return Ok(Self::disabled());
        }
        if config.max_entries == 0 {
            return Err(CacheError::Config(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        let policy = match config.eviction_policy {
            EvictionPolicy::Lru => MokaEvictionPolicy::lru(),
            EvictionPolicy::TinyLfu => MokaEvictionPolicy::tiny_lfu(),
        };
        let mut builder = Cache::builder()
            .max_capacity(config.max_entries)
            // Reduce rehashing during warmup
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .eviction_policy(policy);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        tracing::debug!(
            max_entries = config.max_entries,
            ttl_secs = config.ttl.map(|t| t.as_secs()),
            eviction_policy = %config.eviction_policy,
            "Plan cache enabled"
        );
        Ok(Self {
            cache: Some(builder.build()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn disabled() -> Self {
        Self {
            cache: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let cache = self.cache.as_ref()?;
        let found = cache.get(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.cache {
            cache.insert(key, value);
        }
    }

    /// Drop every entry; counters are kept
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            cache.run_pending_tasks();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.cache.is_some(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.as_ref().map_or(0, |c| {
                c.run_pending_tasks();
                c.entry_count()
            }),
        }
    }
}
