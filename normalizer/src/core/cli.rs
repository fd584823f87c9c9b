use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::EvictionPolicy;
use super::constants::{
    ENV_CACHE_ENABLED, ENV_CACHE_EVICTION_POLICY, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TTL_SECS,
    ENV_CONFIG, ENV_LIST_SAMPLE, ENV_MAX_DEPTH, ENV_MAX_NODES, ENV_RULES_DIR, ENV_RULES_STRICT,
};

#[derive(Parser)]
#[command(name = "sideseat-normalize")]
#[command(version, about = "Normalize LLM span attributes into canonical events", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Directory of rule documents (built-in rules when omitted)
    #[arg(long, short = 'r', global = true, env = ENV_RULES_DIR)]
    pub rules: Option<PathBuf>,

    /// Treat rule warnings as errors
    #[arg(long, global = true, env = ENV_RULES_STRICT)]
    pub strict: bool,

    // Cache options
    /// Enable or disable the plan cache
    #[arg(long, global = true, env = ENV_CACHE_ENABLED)]
    pub cache_enabled: Option<bool>,

    /// Maximum number of cached plans
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Plan time-to-live in seconds (0 = no expiry)
    #[arg(long, global = true, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,

    /// Cache eviction policy (tinylfu or lru)
    #[arg(long, global = true, env = ENV_CACHE_EVICTION_POLICY, value_parser = parse_eviction_policy)]
    pub cache_eviction_policy: Option<EvictionPolicy>,

    // Discovery options
    /// Deepest container level walked into
    #[arg(long, global = true, env = ENV_MAX_DEPTH)]
    pub max_depth: Option<usize>,

    /// Leading list elements classified by content
    #[arg(long, global = true, env = ENV_LIST_SAMPLE)]
    pub list_sample: Option<usize>,

    /// Node budget per record
    #[arg(long, global = true, env = ENV_MAX_NODES)]
    pub max_nodes: Option<usize>,
}

/// Parse eviction policy from CLI/env string
fn parse_eviction_policy(s: &str) -> Result<EvictionPolicy, String> {
    match s.to_lowercase().as_str() {
        "tinylfu" => Ok(EvictionPolicy::TinyLfu),
        "lru" => Ok(EvictionPolicy::Lru),
        _ => Err(format!(
            "Invalid eviction policy '{}'. Valid options: tinylfu, lru",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Check rule documents and print every issue
    Validate,
    /// Compile rule documents and print a bundle summary
    Compile,
    /// Normalize a JSON object or JSONL stream
    Normalize {
        /// Input file (stdin when omitted)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Pretty-print each event
        #[arg(long)]
        pretty: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub strict: bool,
    pub cache_enabled: Option<bool>,
    pub cache_max_entries: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_eviction_policy: Option<EvictionPolicy>,
    pub max_depth: Option<usize>,
    pub list_sample: Option<usize>,
    pub max_nodes: Option<usize>,
}

impl Cli {
    /// Split into layered config input and the command to run
    pub fn into_parts(self) -> (CliConfig, Commands) {
        let cli = self;
        let config = CliConfig {
            config: cli.config,
            rules: cli.rules,
            strict: cli.strict,
            cache_enabled: cli.cache_enabled,
            cache_max_entries: cli.cache_max_entries,
            cache_ttl_secs: cli.cache_ttl_secs,
            cache_eviction_policy: cli.cache_eviction_policy,
            max_depth: cli.max_depth,
            list_sample: cli.list_sample,
            max_nodes: cli.max_nodes,
        };
        (config, cli.command)
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    Cli::parse().into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(args: &[&str]) -> (CliConfig, Commands) {
        Cli::try_parse_from(args).unwrap().into_parts()
    }

    #[test]
    fn test_parse_eviction_policy() {
        assert_eq!(parse_eviction_policy("LRU"), Ok(EvictionPolicy::Lru));
        assert_eq!(parse_eviction_policy("tinylfu"), Ok(EvictionPolicy::TinyLfu));
        assert!(parse_eviction_policy("fifo").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let (config, command) = parse_from(&[
            "sideseat-normalize",
            "validate",
            "--rules",
            "/tmp/rules",
            "--strict",
            "--max-depth",
            "5",
        ]);
        assert!(matches!(command, Commands::Validate));
        assert_eq!(config.rules, Some(PathBuf::from("/tmp/rules")));
        assert!(config.strict);
        assert_eq!(config.max_depth, Some(5));
    }

    #[test]
    fn test_normalize_options() {
        let (config, command) = parse_from(&[
            "sideseat-normalize",
            "--cache-enabled",
            "false",
            "--cache-eviction-policy",
            "lru",
            "normalize",
            "--input",
            "spans.jsonl",
            "--pretty",
        ]);
        assert_eq!(config.cache_enabled, Some(false));
        assert_eq!(config.cache_eviction_policy, Some(EvictionPolicy::Lru));
        match command {
            Commands::Normalize { input, pretty } => {
                assert_eq!(input, Some(PathBuf::from("spans.jsonl")));
                assert!(pretty);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["sideseat-normalize"]).is_err());
    }
}
