use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::discovery::DiscoveryLimits;
use crate::domain::engine::EngineOptions;
use crate::domain::rules::ValidationMode;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_LIST_SAMPLE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES, DEFAULT_UNMAPPED_WARN_RATIO,
};

// =============================================================================
// Eviction Policy Enum
// =============================================================================

/// Plan cache eviction policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// TinyLFU - LRU eviction + LFU admission (near-optimal hit ratio)
    #[default]
    TinyLfu,
    /// Simple LRU (better for recency-biased workloads)
    Lru,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::TinyLfu => write!(f, "tinylfu"),
            EvictionPolicy::Lru => write!(f, "lru"),
        }
    }
}

// =============================================================================
// File Config Sections (from JSON config file)
// =============================================================================

/// Rule source configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RulesFileConfig {
    /// Directory of rule documents (built-in rules when absent)
    pub dir: Option<String>,
    /// Treat rule warnings as errors
    pub strict: Option<bool>,
}

/// Plan cache configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub enabled: Option<bool>,
    /// Maximum number of cached plans
    pub max_entries: Option<u64>,
    /// Plan time-to-live in seconds (0 = no expiry)
    pub ttl_secs: Option<u64>,
    pub eviction_policy: Option<EvictionPolicy>,
}

/// Traversal limits section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DiscoveryFileConfig {
    pub max_depth: Option<usize>,
    pub list_sample: Option<usize>,
    pub max_nodes: Option<usize>,
}

/// Diagnostics section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DiagnosticsFileConfig {
    /// Unmapped share above which a record is logged
    pub unmapped_warn_ratio: Option<f64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub rules: Option<RulesFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub discovery: Option<DiscoveryFileConfig>,
    pub diagnostics: Option<DiagnosticsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(rules) = other.rules {
            let current = self.rules.get_or_insert_with(RulesFileConfig::default);
            if rules.dir.is_some() {
                tracing::trace!(dir = ?rules.dir, "Merging rules.dir");
                current.dir = rules.dir;
            }
            if rules.strict.is_some() {
                tracing::trace!(strict = ?rules.strict, "Merging rules.strict");
                current.strict = rules.strict;
            }
        }

        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.enabled.is_some() {
                tracing::trace!(enabled = ?cache.enabled, "Merging cache.enabled");
                current.enabled = cache.enabled;
            }
            if cache.max_entries.is_some() {
                tracing::trace!(max_entries = ?cache.max_entries, "Merging cache.max_entries");
                current.max_entries = cache.max_entries;
            }
            if cache.ttl_secs.is_some() {
                tracing::trace!(ttl_secs = ?cache.ttl_secs, "Merging cache.ttl_secs");
                current.ttl_secs = cache.ttl_secs;
            }
            if cache.eviction_policy.is_some() {
                tracing::trace!(policy = ?cache.eviction_policy, "Merging cache.eviction_policy");
                current.eviction_policy = cache.eviction_policy;
            }
        }

        if let Some(discovery) = other.discovery {
            let current = self.discovery.get_or_insert_with(DiscoveryFileConfig::default);
            if discovery.max_depth.is_some() {
                current.max_depth = discovery.max_depth;
            }
            if discovery.list_sample.is_some() {
                current.list_sample = discovery.list_sample;
            }
            if discovery.max_nodes.is_some() {
                current.max_nodes = discovery.max_nodes;
            }
        }

        if let Some(diagnostics) = other.diagnostics {
            let current = self.diagnostics.get_or_insert_with(DiagnosticsFileConfig::default);
            if diagnostics.unmapped_warn_ratio.is_some() {
                current.unmapped_warn_ratio = diagnostics.unmapped_warn_ratio;
            }
        }
    }
}

// =============================================================================
// Final Config Structs (after merging)
// =============================================================================

/// Rule source (final/runtime)
#[derive(Debug, Clone, PartialEq)]
pub struct RulesConfig {
    /// Rule directory; `None` selects the built-in rules
    pub dir: Option<PathBuf>,
    pub mode: ValidationMode,
}

/// Plan cache configuration (final/runtime)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    /// Per-entry time-to-live; `None` disables expiry
    pub ttl: Option<Duration>,
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            eviction_policy: EvictionPolicy::default(),
        }
    }
}

/// Diagnostics configuration (final/runtime)
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsConfig {
    pub unmapped_warn_ratio: f64,
}

/// Final merged application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub rules: RulesConfig,
    pub cache: CacheConfig,
    pub discovery: DiscoveryLimits,
    pub diagnostics: DiagnosticsConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.sideseat/normalizer.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        Self::load_layers(cli, get_profile_config_path())
    }

    fn load_layers(cli: &CliConfig, profile_path: Option<PathBuf>) -> Result<Self> {
        tracing::debug!("Loading normalizer configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Profile dir - skip if not exists
        if let Some(profile_path) = profile_path
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Extract file config values with defaults
        let file_rules = file_config.rules.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_discovery = file_config.discovery.unwrap_or_default();
        let file_diagnostics = file_config.diagnostics.unwrap_or_default();

        // 4. Layer configs: defaults -> file config -> CLI/env overrides
        let rules = RulesConfig {
            dir: cli
                .rules
                .as_ref()
                .map(|p| expand_path(&p.to_string_lossy()))
                .or_else(|| file_rules.dir.as_deref().map(expand_path)),
            // --strict only ever tightens
            mode: ValidationMode::from_strict(cli.strict || file_rules.strict.unwrap_or(false)),
        };

        let ttl_secs = cli
            .cache_ttl_secs
            .or(file_cache.ttl_secs)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let cache = CacheConfig {
            enabled: cli.cache_enabled.or(file_cache.enabled).unwrap_or(true),
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            eviction_policy: cli
                .cache_eviction_policy
                .or(file_cache.eviction_policy)
                .unwrap_or_default(),
        };

        let discovery = DiscoveryLimits {
            max_depth: cli
                .max_depth
                .or(file_discovery.max_depth)
                .unwrap_or(DEFAULT_MAX_DEPTH),
            list_sample: cli
                .list_sample
                .or(file_discovery.list_sample)
                .unwrap_or(DEFAULT_LIST_SAMPLE),
            max_nodes: cli
                .max_nodes
                .or(file_discovery.max_nodes)
                .unwrap_or(DEFAULT_MAX_NODES),
        };

        let diagnostics = DiagnosticsConfig {
            unmapped_warn_ratio: file_diagnostics
                .unmapped_warn_ratio
                .unwrap_or(DEFAULT_UNMAPPED_WARN_RATIO),
        };

        let config = Self {
            rules,
            cache,
            discovery,
            diagnostics,
        };
        config.validate()?;

        tracing::debug!(
            rules = ?config.rules.dir,
            mode = %config.rules.mode,
            cache = config.cache.enabled,
            policy = %config.cache.eviction_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            anyhow::bail!("Configuration error: cache.max_entries must be greater than 0");
        }
        if self.discovery.max_depth == 0 {
            anyhow::bail!("Configuration error: discovery.max_depth must be greater than 0");
        }
        if self.discovery.list_sample == 0 {
            anyhow::bail!("Configuration error: discovery.list_sample must be greater than 0");
        }
        if self.discovery.max_nodes == 0 {
            anyhow::bail!("Configuration error: discovery.max_nodes must be greater than 0");
        }
        let ratio = self.diagnostics.unmapped_warn_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            anyhow::bail!(
                "Configuration error: diagnostics.unmapped_warn_ratio must be within [0, 1], got {}",
                ratio
            );
        }
        if let Some(dir) = &self.rules.dir
            && !dir.is_dir()
        {
            anyhow::bail!("Configuration error: rules directory not found: {}", dir.display());
        }
        Ok(())
    }

    /// Engine tuning derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            limits: self.discovery,
            cache: self.cache.clone(),
            unmapped_warn_ratio: self.diagnostics.unmapped_warn_ratio,
        }
    }
}

/// Get the profile config path (~/.sideseat/normalizer.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(cli: &CliConfig) -> Result<AppConfig> {
        AppConfig::load_layers(cli, None)
    }

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_eviction_policy_serde() {
        let policy: EvictionPolicy = serde_json::from_str(r#""lru""#).unwrap();
        assert_eq!(policy, EvictionPolicy::Lru);
        let policy: EvictionPolicy = serde_json::from_str(r#""tinylfu""#).unwrap();
        assert_eq!(policy, EvictionPolicy::TinyLfu);
    }

    #[test]
    fn test_eviction_policy_display() {
        assert_eq!(EvictionPolicy::TinyLfu.to_string(), "tinylfu");
        assert_eq!(EvictionPolicy::Lru.to_string(), "lru");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "rules": { "dir": "/etc/sideseat/rules", "strict": true },
            "cache": { "enabled": false, "max_entries": 50, "ttl_secs": 0, "eviction_policy": "lru" },
            "discovery": { "max_depth": 4, "list_sample": 1, "max_nodes": 100 },
            "diagnostics": { "unmapped_warn_ratio": 0.9 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let rules = config.rules.as_ref().unwrap();
        assert_eq!(rules.dir.as_deref(), Some("/etc/sideseat/rules"));
        assert_eq!(rules.strict, Some(true));
        let cache = config.cache.as_ref().unwrap();
        assert_eq!(cache.enabled, Some(false));
        assert_eq!(cache.eviction_policy, Some(EvictionPolicy::Lru));
        assert_eq!(config.discovery.as_ref().unwrap().max_nodes, Some(100));
        assert_eq!(
            config.diagnostics.as_ref().unwrap().unmapped_warn_ratio,
            Some(0.9)
        );
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.rules.is_none());
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "cache": { "enabled": true }, "caches": 123 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache.as_ref().unwrap().enabled, Some(true));
        assert_eq!(config.extra.get("caches").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "cache": { "enabled": true, "max_entries": 10 }, "discovery": { "max_depth": 3 } }"#,
        )
        .unwrap();
        let overlay: FileConfig = serde_json::from_str(
            r#"{ "cache": { "max_entries": 20 }, "rules": { "strict": true } }"#,
        )
        .unwrap();
        base.merge(overlay);

        let cache = base.cache.unwrap();
        assert_eq!(cache.enabled, Some(true));
        assert_eq!(cache.max_entries, Some(20));
        assert_eq!(base.discovery.unwrap().max_depth, Some(3));
        assert_eq!(base.rules.unwrap().strict, Some(true));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = load(&CliConfig::default()).unwrap();

        assert!(config.rules.dir.is_none());
        assert_eq!(config.rules.mode, ValidationMode::Permissive);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.discovery, DiscoveryLimits::default());
        assert_eq!(config.diagnostics.unmapped_warn_ratio, DEFAULT_UNMAPPED_WARN_RATIO);
    }

    #[test]
    fn test_app_config_file_then_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "custom.json",
            r#"{
                "cache": { "max_entries": 50, "ttl_secs": 0, "eviction_policy": "lru" },
                "discovery": { "max_depth": 4, "list_sample": 2 },
                "diagnostics": { "unmapped_warn_ratio": 0.75 }
            }"#,
        );
        let cli = CliConfig {
            config: Some(path),
            strict: true,
            cache_max_entries: Some(500),
            max_depth: Some(6),
            ..CliConfig::default()
        };
        let config = load(&cli).unwrap();

        assert_eq!(config.rules.mode, ValidationMode::Strict);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.ttl, None);
        assert_eq!(config.cache.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.discovery.max_depth, 6);
        assert_eq!(config.discovery.list_sample, 2);
        assert_eq!(config.discovery.max_nodes, DEFAULT_MAX_NODES);
        assert_eq!(config.diagnostics.unmapped_warn_ratio, 0.75);

        let options = config.engine_options();
        assert_eq!(options.limits.max_depth, 6);
        assert_eq!(options.unmapped_warn_ratio, 0.75);
    }

    #[test]
    fn test_profile_layer_below_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let profile = write_config(
            dir.path(),
            "profile.json",
            r#"{ "cache": { "enabled": false, "max_entries": 7 } }"#,
        );
        let overlay = write_config(dir.path(), "overlay.json", r#"{ "cache": { "max_entries": 9 } }"#);
        let cli = CliConfig {
            config: Some(overlay),
            ..CliConfig::default()
        };
        let config = AppConfig::load_layers(&cli, Some(profile)).unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_entries, 9);
    }

    #[test]
    fn test_app_config_missing_config_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/normalizer.json")),
            ..CliConfig::default()
        };
        let err = load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_app_config_validation_zero_limits() {
        for cli in [
            CliConfig {
                max_depth: Some(0),
                ..CliConfig::default()
            },
            CliConfig {
                list_sample: Some(0),
                ..CliConfig::default()
            },
            CliConfig {
                max_nodes: Some(0),
                ..CliConfig::default()
            },
            CliConfig {
                cache_max_entries: Some(0),
                ..CliConfig::default()
            },
        ] {
            let err = load(&cli).unwrap_err();
            assert!(err.to_string().contains("must be greater than 0"), "{err}");
        }
    }

    #[test]
    fn test_app_config_zero_entries_allowed_when_cache_disabled() {
        let cli = CliConfig {
            cache_enabled: Some(false),
            cache_max_entries: Some(0),
            ..CliConfig::default()
        };
        assert!(load(&cli).is_ok());
    }

    #[test]
    fn test_app_config_validation_ratio_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "ratio.json",
            r#"{ "diagnostics": { "unmapped_warn_ratio": 1.5 } }"#,
        );
        let cli = CliConfig {
            config: Some(path),
            ..CliConfig::default()
        };
        let err = load(&cli).unwrap_err();
        assert!(err.to_string().contains("unmapped_warn_ratio"));
    }

    #[test]
    fn test_app_config_rules_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliConfig {
            rules: Some(dir.path().to_path_buf()),
            ..CliConfig::default()
        };
        assert_eq!(load(&cli).unwrap().rules.dir.as_deref(), Some(dir.path()));

        let cli = CliConfig {
            rules: Some(dir.path().join("missing")),
            ..CliConfig::default()
        };
        assert!(load(&cli).is_err());
    }
}
