//! Serde shapes of the four rule document kinds.

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// Document kinds, in the order they are listed by `compile` summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Classification,
    Signatures,
    Mappings,
    Transforms,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Classification,
        DocumentKind::Signatures,
        DocumentKind::Mappings,
        DocumentKind::Transforms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Signatures => "signatures",
            Self::Mappings => "mappings",
            Self::Transforms => "transforms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Whether a rule set without this kind is invalid
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::Transforms)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationDocument {
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field_types: Vec<String>,
    #[serde(default)]
    pub path_rules: Vec<PathRule>,
    #[serde(default)]
    pub value_sets: Vec<ValueSetRule>,
    #[serde(default)]
    pub prefix_rules: Vec<PrefixRule>,
    #[serde(default)]
    pub numeric_rules: Vec<NumericRule>,
    #[serde(default)]
    pub shape_rules: Vec<ShapeRule>,
}

/// Schema-path suffix -> field type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathRule {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Take a container at this path whole instead of walking into it
    #[serde(default)]
    pub capture: bool,
}

/// Case-insensitive string tokens -> field type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueSetRule {
    #[serde(rename = "type")]
    pub field_type: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Case-insensitive string prefixes -> field type, first match wins
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixRule {
    #[serde(rename = "type")]
    pub field_type: String,
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Numbers within an inclusive range -> field type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericRule {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// `Some(true)` only integers, `Some(false)` only non-integers
    #[serde(default)]
    pub integer: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Child `key` of an object holding all `required_keys` -> field type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeRule {
    #[serde(rename = "type")]
    pub field_type: String,
    pub required_keys: Vec<String>,
    pub key: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

// =============================================================================
// Signatures
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignaturesDocument {
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conventions: Vec<SignatureRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub weights: Option<SignatureWeights>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureWeights {
    pub required: f64,
    pub optional: f64,
}

// =============================================================================
// Mappings
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingsDocument {
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mappings: Vec<MappingRule>,
    #[serde(default)]
    pub derived: Vec<DerivedRule>,
}

/// Field type (optionally scoped to a convention) -> `section.field`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingRule {
    #[serde(rename = "type")]
    pub field_type: String,
    /// Present on convention-specific overrides
    #[serde(default)]
    pub convention: Option<String>,
    pub target: String,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub collect: bool,
}

/// Value computed from other field types with an aggregate transform
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedRule {
    pub target: String,
    pub aggregate: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub unless_present: Option<String>,
}

// =============================================================================
// Transforms
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformsDocument {
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transforms: Vec<TransformDefinition>,
}

/// Binds a name to a registry function with parameters
#[derive(Debug, Clone, Deserialize)]
pub struct TransformDefinition {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub params: Map<String, JsonValue>,
    #[serde(default)]
    pub description: Option<String>,
    /// Anything else; inline code keys are rejected by validation
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}
