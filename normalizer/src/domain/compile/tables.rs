//! Lookup tables of a compiled bundle.

use serde_json::{Map, Number, Value as JsonValue};

use crate::domain::transforms::{AggregateTransform, TransformSpec};
use crate::domain::types::{FieldTypeId, Section, TransformId};

/// A field type with the confidence of the rule that assigns it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classified {
    pub field_type: FieldTypeId,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathClass {
    pub class: Classified,
    pub capture: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericClass {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: Option<bool>,
    pub class: Classified,
}

impl NumericClass {
    pub fn matches(&self, n: &Number) -> bool {
        let Some(f) = n.as_f64() else {
            return false;
        };
        let is_integer = n.is_i64() || n.is_u64();
        self.integer.is_none_or(|want| want == is_integer)
            && self.min.is_none_or(|min| f >= min)
            && self.max.is_none_or(|max| f <= max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeClass {
    pub required_keys: Vec<String>,
    pub key: String,
    pub class: Classified,
}

impl ShapeClass {
    pub fn matches(&self, map: &Map<String, JsonValue>) -> bool {
        map.contains_key(&self.key) && self.required_keys.iter().all(|k| map.contains_key(k))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSignature {
    pub name: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub required_weight: f64,
    pub optional_weight: f64,
    /// Short digest of name and field sets
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingTarget {
    pub section: Section,
    /// Dotted field inside the section
    pub field: String,
    pub transform: TransformId,
    pub collect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDerived {
    pub section: Section,
    pub field: String,
    pub aggregate: AggregateTransform,
    pub sources: Vec<FieldTypeId>,
    pub unless_present: Option<FieldTypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTransform {
    pub name: String,
    pub spec: TransformSpec,
}
