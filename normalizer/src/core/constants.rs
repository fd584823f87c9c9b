// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and log filters)
pub const APP_NAME_LOWER: &str = "sideseat_normalizer";

/// Unix-style dotfile folder name shared with the rest of the toolchain
pub const APP_DOT_FOLDER: &str = ".sideseat";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name (profile directory and working directory)
pub const CONFIG_FILE_NAME: &str = "normalizer.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SIDESEAT_NORMALIZER_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SIDESEAT_LOG";

// =============================================================================
// Environment Variables - Rules
// =============================================================================

/// Directory holding rule documents
pub const ENV_RULES_DIR: &str = "SIDESEAT_NORMALIZER_RULES";

/// Promote rule warnings to errors
pub const ENV_RULES_STRICT: &str = "SIDESEAT_NORMALIZER_STRICT";

// =============================================================================
// Environment Variables - Cache
// =============================================================================

pub const ENV_CACHE_ENABLED: &str = "SIDESEAT_NORMALIZER_CACHE_ENABLED";
pub const ENV_CACHE_MAX_ENTRIES: &str = "SIDESEAT_NORMALIZER_CACHE_MAX_ENTRIES";
pub const ENV_CACHE_TTL_SECS: &str = "SIDESEAT_NORMALIZER_CACHE_TTL_SECS";
pub const ENV_CACHE_EVICTION_POLICY: &str = "SIDESEAT_NORMALIZER_CACHE_EVICTION_POLICY";

// =============================================================================
// Environment Variables - Discovery
// =============================================================================

pub const ENV_MAX_DEPTH: &str = "SIDESEAT_NORMALIZER_MAX_DEPTH";
pub const ENV_LIST_SAMPLE: &str = "SIDESEAT_NORMALIZER_LIST_SAMPLE";
pub const ENV_MAX_NODES: &str = "SIDESEAT_NORMALIZER_MAX_NODES";

// =============================================================================
// Rule Documents
// =============================================================================

/// Rule document format version understood by this build
pub const RULE_FORMAT_VERSION: u32 = 1;

/// Keys that would carry executable code in a transform definition
pub const INLINE_CODE_KEYS: &[&str] = &["code", "body", "script", "expression", "lambda"];

/// Name of the implicit pass-through transform
pub const IDENTITY_TRANSFORM: &str = "identity";

/// Reserved field type for values no rule recognizes
pub const UNKNOWN_FIELD_TYPE: &str = "unknown";

// =============================================================================
// Classification Confidence
// =============================================================================

/// Default confidence of an exact path-suffix match
pub const PATH_RULE_CONFIDENCE: f64 = 1.0;

/// Default confidence of a value-set (token membership) match
pub const VALUE_SET_CONFIDENCE: f64 = 0.8;

/// Default confidence of a string prefix match
pub const PREFIX_RULE_CONFIDENCE: f64 = 0.7;

/// Default confidence of a numeric range match
pub const NUMERIC_RULE_CONFIDENCE: f64 = 0.5;

/// Default confidence of a container shape match
pub const SHAPE_RULE_CONFIDENCE: f64 = 0.9;

/// Confidence attached to `unknown` classifications
pub const UNKNOWN_FIELD_CONFIDENCE: f64 = 0.1;

/// Strings longer than this are never looked up in value sets
pub const MAX_TOKEN_LEN: usize = 64;

// =============================================================================
// Convention Detection
// =============================================================================

/// Minimum confidence for a declared convention to be reported.
/// Synthetic identities always score below this.
pub const MIN_CONVENTION_CONFIDENCE: f64 = 0.4;

/// Confidence at or above which a match counts as high confidence
pub const HIGH_CONVENTION_CONFIDENCE: f64 = 0.8;

/// Default signature weights when a document omits them
pub const DEFAULT_REQUIRED_WEIGHT: f64 = 0.85;
pub const DEFAULT_OPTIONAL_WEIGHT: f64 = 0.15;

/// Prefix of synthesized convention names
pub const SYNTHETIC_CONVENTION_PREFIX: &str = "unknown_";

/// Hex characters of the path-set digest used in synthetic names
pub const SYNTHETIC_NAME_HASH_LEN: usize = 12;

/// Hex characters kept for signature hashes
pub const SIGNATURE_HASH_LEN: usize = 16;

// =============================================================================
// Discovery Limits
// =============================================================================

/// Deepest container level that is walked into
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Leading list elements that receive content classification
pub const DEFAULT_LIST_SAMPLE: usize = 3;

/// Node budget for one record
pub const DEFAULT_MAX_NODES: usize = 4096;

// =============================================================================
// Cache Defaults
// =============================================================================

/// Default maximum cached classification plans
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

/// Default plan time-to-live
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// Diagnostics
// =============================================================================

/// Unmapped share of fields above which a warning is logged
pub const DEFAULT_UNMAPPED_WARN_RATIO: f64 = 0.5;

/// Key used in `unmapped` for a record whose top level is not an object
pub const NON_OBJECT_ROOT_KEY: &str = "$";
