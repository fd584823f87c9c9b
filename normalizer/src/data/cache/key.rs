//! Structural cache keys.
//!
//! Two records share a key when they have the same leaf paths, value kinds
//! and walked containers, and the same content at every leaf whose
//! classification depends on content.

use serde_json::{Number, Value as JsonValue};
use sha2::{Digest, Sha256};

use crate::utils::json::ValueKind;

/// SHA-256 digest of a record's structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

/// Key of a memoized classification plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanKey {
    /// Derived from the bundle fingerprint, so a reload never reuses plans
    pub bundle: u64,
    pub signature: Signature,
}

impl PlanKey {
    pub fn new(bundle: u64, signature: Signature) -> Self {
        Self { bundle, signature }
    }
}

// Tags keep the encoding prefix-free across write kinds
const TAG_LEAF: u8 = 0x01;
const TAG_CONTAINER: u8 = 0xfe;
const TAG_MARKER: u8 = 0xff;
const TAG_NULL: u8 = 0x10;
const TAG_BOOL: u8 = 0x11;
const TAG_I64: u8 = 0x12;
const TAG_U64: u8 = 0x13;
const TAG_F64: u8 = 0x14;
const TAG_STR: u8 = 0x15;
const TAG_ARRAY: u8 = 0x16;
const TAG_OBJECT: u8 = 0x17;

/// Incremental builder for a record's structural signature.
///
/// Records with colliding signatures would share a classification plan, so
/// the digest is cryptographic rather than a fast hash.
#[derive(Default)]
pub struct SignatureHasher {
    hasher: Sha256,
    leaves: u64,
}

impl SignatureHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a leaf by path and value kind
    pub fn leaf(&mut self, path: &str, kind: ValueKind) {
        self.leaves += 1;
        self.hasher.update([TAG_LEAF]);
        self.str(path);
        self.str(kind.as_str());
    }

    /// Record a container that was walked into
    pub fn container(&mut self, path: &str) {
        self.hasher.update([TAG_CONTAINER]);
        self.str(path);
    }

    /// Mix in a value that content heuristics will look at
    pub fn content(&mut self, value: &JsonValue) {
        match value {
            JsonValue::Null => self.hasher.update([TAG_NULL]),
            JsonValue::Bool(b) => self.hasher.update([TAG_BOOL, u8::from(*b)]),
            JsonValue::Number(n) => self.number(n),
            JsonValue::String(s) => {
                self.hasher.update([TAG_STR]);
                self.str(s);
            }
            JsonValue::Array(items) => {
                self.hasher.update([TAG_ARRAY]);
                self.len(items.len());
                for item in items {
                    self.content(item);
                }
            }
            JsonValue::Object(map) => {
                self.hasher.update([TAG_OBJECT]);
                self.len(map.len());
                for (key, item) in map {
                    self.str(key);
                    self.content(item);
                }
            }
        }
    }

    /// Mark a structural event that is not a leaf (e.g. budget exhaustion)
    pub fn marker(&mut self, tag: &str) {
        self.hasher.update([TAG_MARKER]);
        self.str(tag);
    }

    pub fn finish(mut self) -> Signature {
        self.hasher.update(self.leaves.to_le_bytes());
        Signature(self.hasher.finalize().into())
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.hasher.update(s.as_bytes());
    }

    fn len(&mut self, n: usize) {
        self.hasher.update((n as u64).to_le_bytes());
    }

    fn number(&mut self, n: &Number) {
        if let Some(i) = n.as_i64() {
            self.hasher.update([TAG_I64]);
            self.hasher.update(i.to_le_bytes());
        } else if let Some(u) = n.as_u64() {
            self.hasher.update([TAG_U64]);
            self.hasher.update(u.to_le_bytes());
        } else if let Some(f) = n.as_f64() {
            self.hasher.update([TAG_F64]);
            self.hasher.update(f.to_bits().to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signature(leaves: &[(&str, JsonValue, bool)]) -> Signature {
        let mut hasher = SignatureHasher::new();
        for (path, value, content) in leaves {
            hasher.leaf(path, ValueKind::of(value));
            if *content {
                hasher.content(value);
            }
        }
        hasher.finish()
    }

    #[test]
    fn test_same_structure_same_signature() {
        let a = signature(&[("model", json!("gpt-4"), false)]);
        let b = signature(&[("model", json!("gpt-3.5"), false)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_changes_signature_when_hashed() {
        let a = signature(&[("x", json!("stop"), true)]);
        let b = signature(&[("x", json!("bar"), true)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_and_path_change_signature() {
        let a = signature(&[("x", json!("1"), false)]);
        let b = signature(&[("x", json!(1), false)]);
        let c = signature(&[("y", json!("1"), false)]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_marker_changes_signature() {
        let mut a = SignatureHasher::new();
        a.leaf("x", ValueKind::String);
        let mut b = SignatureHasher::new();
        b.leaf("x", ValueKind::String);
        b.marker("truncated");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let mut a = SignatureHasher::new();
        a.leaf("ab", ValueKind::String);
        a.content(&json!("c"));
        let mut b = SignatureHasher::new();
        b.leaf("a", ValueKind::String);
        b.content(&json!("bc"));
        assert_ne!(a.finish(), b.finish());

        let nested = signature(&[("x", json!(["a", "b"]), true)]);
        let joined = signature(&[("x", json!(["ab"]), true)]);
        assert_ne!(nested, joined);
    }

    #[test]
    fn test_container_changes_signature() {
        let mut flat = SignatureHasher::new();
        flat.leaf("a.b", ValueKind::Integer);
        let mut nested = SignatureHasher::new();
        nested.container("a");
        nested.leaf("a.b", ValueKind::Integer);
        assert_ne!(flat.finish(), nested.finish());
    }
}
