//! Core types shared by discovery, detection and mapping.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// =============================================================================
// Identifiers
// =============================================================================

/// Interned field type. Id 0 is the reserved `unknown` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldTypeId(pub(crate) u16);

impl FieldTypeId {
    pub const UNKNOWN: Self = Self(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

/// Index into the compiled signature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConventionId(pub(crate) u16);

impl ConventionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the compiled transform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformId(pub(crate) u16);

impl TransformId {
    /// The implicit pass-through transform always occupies slot 0
    pub const IDENTITY: Self = Self(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Canonical Sections
// =============================================================================

/// Top-level section of a canonical event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Inputs,
    Outputs,
    Config,
    Metadata,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Inputs,
        Section::Outputs,
        Section::Config,
        Section::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Inputs => "inputs",
            Section::Outputs => "outputs",
            Section::Config => "config",
            Section::Metadata => "metadata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inputs" => Some(Section::Inputs),
            "outputs" => Some(Section::Outputs),
            "config" => Some(Section::Config),
            "metadata" => Some(Section::Metadata),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Which rule produced a field's classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    PathRule,
    ValueSet,
    Prefix,
    NumericRange,
    Shape,
    /// Copied from a sampled sibling with the same schema path
    Inherited,
    Unknown,
}

/// Field type plus the confidence of the rule that chose it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub field_type: FieldTypeId,
    pub confidence: f64,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            field_type: FieldTypeId::UNKNOWN,
            confidence: crate::core::constants::UNKNOWN_FIELD_CONFIDENCE,
            source: ClassificationSource::Unknown,
        }
    }
}

/// A classified leaf of the input record
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredField {
    /// Full dotted path including list indices (`choices.0.message.content`)
    pub path: String,
    /// Path with index segments removed (`choices.message.content`)
    pub schema_path: String,
    pub value: JsonValue,
    pub field_type: FieldTypeId,
    pub confidence: f64,
    pub source: ClassificationSource,
    /// Hash of schema path and value kind
    pub structural_hash: u64,
}

/// Per-record index over discovered fields
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    pub fields: Vec<DiscoveredField>,
    pub by_type: FxHashMap<FieldTypeId, Vec<usize>>,
    /// Fields grouped by the section of their default mapping
    pub by_section: FxHashMap<Section, Vec<usize>>,
    /// Every schema path seen, containers included
    pub paths: FxHashSet<String>,
    /// True when the node budget cut the walk short
    pub truncated: bool,
}

impl FieldIndex {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_type(&self, field_type: FieldTypeId) -> bool {
        self.by_type.contains_key(&field_type)
    }

    pub fn of_type(&self, field_type: FieldTypeId) -> impl Iterator<Item = &DiscoveredField> {
        self.by_type
            .get(&field_type)
            .into_iter()
            .flatten()
            .map(|&idx| &self.fields[idx])
    }
}

// =============================================================================
// Convention Detection
// =============================================================================

/// Identity of a detected convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    Known(ConventionId),
    Synthetic,
}

/// Result of convention detection
#[derive(Debug, Clone, PartialEq)]
pub struct ConventionMatch {
    pub name: String,
    pub convention: Convention,
    pub confidence: f64,
    /// Signature fields present in the record (all paths for synthetic)
    pub matched_fields: usize,
    pub signature_hash: String,
}

impl ConventionMatch {
    pub fn is_synthetic(&self) -> bool {
        self.convention == Convention::Synthetic
    }

    pub fn known_id(&self) -> Option<ConventionId> {
        match self.convention {
            Convention::Known(id) => Some(id),
            Convention::Synthetic => None,
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Provider-neutral record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalEvent {
    pub inputs: Map<String, JsonValue>,
    pub outputs: Map<String, JsonValue>,
    pub config: Map<String, JsonValue>,
    pub metadata: Map<String, JsonValue>,
    /// Full field path -> raw value for everything that could not be placed
    pub unmapped: Map<String, JsonValue>,
}

impl CanonicalEvent {
    pub fn section(&self, section: Section) -> &Map<String, JsonValue> {
        match section {
            Section::Inputs => &self.inputs,
            Section::Outputs => &self.outputs,
            Section::Config => &self.config,
            Section::Metadata => &self.metadata,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Map<String, JsonValue> {
        match section {
            Section::Inputs => &mut self.inputs,
            Section::Outputs => &mut self.outputs,
            Section::Config => &mut self.config,
            Section::Metadata => &mut self.metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|s| self.section(*s).is_empty()) && self.unmapped.is_empty()
    }

    /// Insert into `unmapped` without overwriting an earlier value at the same path
    pub fn push_unmapped(&mut self, path: &str, value: JsonValue) {
        if !self.unmapped.contains_key(path) {
            self.unmapped.insert(path.to_string(), value);
            return;
        }
        let mut n = 2usize;
        loop {
            let key = format!("{path}#{n}");
            if !self.unmapped.contains_key(&key) {
                self.unmapped.insert(key, value);
                return;
            }
            n += 1;
        }
    }
}

/// Per-record diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub convention: String,
    pub confidence: f64,
    pub synthetic: bool,
    pub signature_hash: String,
    pub mapped_fields: usize,
    pub unmapped_fields: usize,
    pub derived_fields: usize,
    pub truncated: bool,
    pub bundle_fingerprint: String,
}

/// Canonical event plus diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    #[serde(flatten)]
    pub event: CanonicalEvent,
    pub diagnostics: Diagnostics,
}
