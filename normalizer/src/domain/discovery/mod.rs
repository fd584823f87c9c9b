//! Field discovery.
//!
//! Walks a record with an explicit stack and classifies every leaf. The
//! walk is split in two so the content-independent part can be cached:
//!
//! 1. [`walk`] collects leaves, schema paths and the structural signature;
//! 2. [`classify`] assigns a type to each leaf (path rules, then content
//!    heuristics, then `unknown`);
//! 3. [`build_index`] joins the two into a [`FieldIndex`].

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::core::constants::{DEFAULT_LIST_SAMPLE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};
use crate::data::cache::{Signature, SignatureHasher};
use crate::domain::compile::{Classified, CompiledBundle};
use crate::domain::types::{Classification, ClassificationSource, DiscoveredField, FieldIndex};
use crate::utils::json::{ValueKind, is_scalar_list};
use crate::utils::string::{join_path, schema_path};

// =============================================================================
// Limits
// =============================================================================

/// Traversal budgets for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryLimits {
    /// Containers at this depth are taken whole
    pub max_depth: usize,
    /// Leading list elements that get content heuristics
    pub list_sample: usize,
    /// Nodes visited before the rest is emitted unclassified
    pub max_nodes: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            list_sample: DEFAULT_LIST_SAMPLE,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

// =============================================================================
// Walk
// =============================================================================

/// A leaf found by the walk, before classification
#[derive(Debug, Clone)]
pub struct Leaf<'a> {
    pub path: String,
    pub schema_path: String,
    pub value: &'a JsonValue,
    path_hit: Option<Classified>,
    shape_hint: Option<Classified>,
    /// Within the sampled prefix of every enclosing list
    sampled: bool,
    /// Emitted after the node budget ran out
    exhausted: bool,
    /// Container kept whole (captured or at the depth bound)
    container: bool,
}

impl Leaf<'_> {
    /// Whether classification may look at the value itself
    fn content_dependent(&self) -> bool {
        self.path_hit.is_none() && self.sampled && !self.exhausted && !self.container
    }
}

/// Leaves, schema paths and structural signature of a record
#[derive(Debug)]
pub struct Walk<'a> {
    pub leaves: Vec<Leaf<'a>>,
    /// Every schema path seen, containers included
    pub paths: FxHashSet<String>,
    pub signature: Signature,
    pub truncated: bool,
}

struct Frame<'a> {
    path: String,
    value: &'a JsonValue,
    depth: usize,
    sampled: bool,
    shape_hint: Option<Classified>,
}

/// Walk a record iteratively, in document order.
pub fn walk<'a>(
    bundle: &CompiledBundle,
    attributes: &'a Map<String, JsonValue>,
    limits: &DiscoveryLimits,
) -> Walk<'a> {
    let mut stack: Vec<Frame<'a>> = attributes
        .iter()
        .rev()
        .map(|(key, value)| Frame {
            path: key.clone(),
            value,
            depth: 1,
            sampled: true,
            shape_hint: None,
        })
        .collect();

    let mut leaves = Vec::with_capacity(attributes.len());
    let mut paths = FxHashSet::default();
    let mut signature = SignatureHasher::new();
    let mut nodes = 0usize;
    let mut truncated = false;

    while let Some(frame) = stack.pop() {
        nodes += 1;
        let schema = schema_path(&frame.path);
        let kind = ValueKind::of(frame.value);

        if nodes > limits.max_nodes {
            if !truncated {
                truncated = true;
                signature.marker("node_budget");
                tracing::debug!(
                    max_nodes = limits.max_nodes,
                    remaining = stack.len() + 1,
                    "Node budget exhausted; remaining fields left unclassified"
                );
            }
            signature.leaf(&frame.path, kind);
            paths.insert(schema.clone());
            leaves.push(Leaf {
                path: frame.path,
                schema_path: schema,
                value: frame.value,
                path_hit: None,
                shape_hint: None,
                sampled: false,
                exhausted: true,
                container: kind.is_container(),
            });
            continue;
        }

        let path_hit = bundle.match_path(&schema).copied();
        let walkable = match frame.value {
            JsonValue::Object(map) => !map.is_empty(),
            JsonValue::Array(items) => !items.is_empty() && !is_scalar_list(items),
            _ => false,
        };
        let captured = path_hit.is_some_and(|p| p.capture);

        if walkable && !captured && frame.depth < limits.max_depth {
            push_children(bundle, &frame, limits, &mut stack);
            signature.container(&frame.path);
            paths.insert(schema);
            continue;
        }

        let leaf = Leaf {
            path: frame.path,
            schema_path: schema,
            value: frame.value,
            path_hit: path_hit.map(|p| p.class),
            shape_hint: frame.shape_hint,
            sampled: frame.sampled,
            exhausted: false,
            container: walkable,
        };
        signature.leaf(&leaf.path, kind);
        if leaf.content_dependent() {
            signature.content(leaf.value);
        }
        paths.insert(leaf.schema_path.clone());
        leaves.push(leaf);
    }

    Walk {
        leaves,
        paths,
        signature: signature.finish(),
        truncated,
    }
}

fn push_children<'a>(
    bundle: &CompiledBundle,
    frame: &Frame<'a>,
    limits: &DiscoveryLimits,
    stack: &mut Vec<Frame<'a>>,
) {
    let depth = frame.depth + 1;
    match frame.value {
        JsonValue::Object(map) => {
            let hints: Vec<(&str, Classified)> = if bundle.has_shape_rules() {
                bundle.shape_hints(map).collect()
            } else {
                Vec::new()
            };
            for (key, value) in map.iter().rev() {
                let shape_hint = hints
                    .iter()
                    .find(|(hint_key, _)| *hint_key == key.as_str())
                    .map(|(_, class)| *class);
                stack.push(Frame {
                    path: join_path(&frame.path, key),
                    value,
                    depth,
                    sampled: frame.sampled,
                    shape_hint,
                });
            }
        }
        JsonValue::Array(items) => {
            for (idx, value) in items.iter().enumerate().rev() {
                stack.push(Frame {
                    path: join_path(&frame.path, &idx.to_string()),
                    value,
                    depth,
                    sampled: frame.sampled && idx < limits.list_sample,
                    shape_hint: None,
                });
            }
        }
        _ => {}
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify every leaf of a walk, in leaf order.
///
/// Unsampled leaves reuse what a sampled leaf with the same schema path was
/// classified as, so list tails cost a hash lookup each.
pub fn classify(bundle: &CompiledBundle, walk: &Walk<'_>, limits: &DiscoveryLimits) -> Vec<Classification> {
    let mut learned: FxHashMap<&str, Classification> = FxHashMap::default();
    let mut out = Vec::with_capacity(walk.leaves.len());

    for leaf in &walk.leaves {
        let class = if leaf.exhausted {
            Classification::unknown()
        } else if let Some(hit) = leaf.path_hit {
            from_rule(hit, ClassificationSource::PathRule)
        } else if !leaf.sampled {
            learned
                .get(leaf.schema_path.as_str())
                .map(|c| Classification {
                    source: ClassificationSource::Inherited,
                    ..*c
                })
                .unwrap_or_else(Classification::unknown)
        } else {
            match content_class(bundle, leaf, limits) {
                Some(c) => {
                    learned.entry(leaf.schema_path.as_str()).or_insert(c);
                    c
                }
                None => Classification::unknown(),
            }
        };
        out.push(class);
    }
    out
}

fn from_rule(class: Classified, source: ClassificationSource) -> Classification {
    Classification {
        field_type: class.field_type,
        confidence: class.confidence,
        source,
    }
}

/// Content heuristics in priority order: value set, prefix, numeric range, shape
fn content_class(bundle: &CompiledBundle, leaf: &Leaf<'_>, limits: &DiscoveryLimits) -> Option<Classification> {
    let by_value = match leaf.value {
        JsonValue::Array(items) if !leaf.container => list_class(bundle, items, limits.list_sample),
        value if !leaf.container => scalar_class(bundle, value),
        _ => None,
    };
    by_value.or_else(|| {
        leaf.shape_hint
            .map(|c| from_rule(c, ClassificationSource::Shape))
    })
}

fn scalar_class(bundle: &CompiledBundle, value: &JsonValue) -> Option<Classification> {
    match value {
        JsonValue::String(s) => bundle
            .match_value(s)
            .map(|c| from_rule(c, ClassificationSource::ValueSet))
            .or_else(|| {
                bundle
                    .match_prefix(s)
                    .map(|c| from_rule(c, ClassificationSource::Prefix))
            }),
        JsonValue::Number(n) => bundle
            .match_number(n)
            .map(|c| from_rule(c, ClassificationSource::NumericRange)),
        _ => None,
    }
}

/// A scalar list takes a type only when every sampled element agrees
fn list_class(bundle: &CompiledBundle, items: &[JsonValue], sample: usize) -> Option<Classification> {
    let mut agreed: Option<Classification> = None;
    for item in items.iter().take(sample) {
        let class = scalar_class(bundle, item)?;
        agreed = match agreed {
            None => Some(class),
            Some(prev) if prev.field_type == class.field_type => Some(Classification {
                confidence: prev.confidence.min(class.confidence),
                ..prev
            }),
            Some(_) => return None,
        };
    }
    agreed
}

// =============================================================================
// Index
// =============================================================================

/// Join walk leaves with their classifications.
pub fn build_index(bundle: &CompiledBundle, walk: Walk<'_>, classes: &[Classification]) -> FieldIndex {
    let mut index = FieldIndex {
        fields: Vec::with_capacity(walk.leaves.len()),
        paths: walk.paths,
        truncated: walk.truncated,
        ..FieldIndex::default()
    };

    for (idx, (leaf, class)) in walk.leaves.into_iter().zip(classes).enumerate() {
        index.by_type.entry(class.field_type).or_default().push(idx);
        if let Some(section) = bundle.default_section(class.field_type) {
            index.by_section.entry(section).or_default().push(idx);
        }

        let mut hasher = FxHasher::default();
        leaf.schema_path.hash(&mut hasher);
        ValueKind::of(leaf.value).hash(&mut hasher);

        index.fields.push(DiscoveredField {
            path: leaf.path,
            schema_path: leaf.schema_path,
            value: leaf.value.clone(),
            field_type: class.field_type,
            confidence: class.confidence,
            source: class.source,
            structural_hash: hasher.finish(),
        });
    }
    index
}

/// Walk, classify and index a record in one call.
pub fn discover(
    bundle: &CompiledBundle,
    attributes: &Map<String, JsonValue>,
    limits: &DiscoveryLimits,
) -> FieldIndex {
    let walk = walk(bundle, attributes, limits);
    let classes = classify(bundle, &walk, limits);
    build_index(bundle, walk, &classes)
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
