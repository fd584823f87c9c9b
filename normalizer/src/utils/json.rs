//! JSON utility functions

use serde_json::{Map, Value as JsonValue};

/// Coarse shape of a JSON value, used for structural signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(_) => Self::Bool,
            JsonValue::Number(n) if n.is_f64() => Self::Float,
            JsonValue::Number(_) => Self::Integer,
            JsonValue::String(_) => Self::String,
            JsonValue::Array(_) => Self::Array,
            JsonValue::Object(_) => Self::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "int",
            Self::Float => "float",
            Self::String => "str",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

/// True for non-empty arrays that hold no arrays or objects.
pub fn is_scalar_list(items: &[JsonValue]) -> bool {
    !items.is_empty() && items.iter().all(|v| !ValueKind::of(v).is_container())
}

/// Set `value` at a dotted path, creating intermediate objects.
///
/// Returns the value back when the slot is already taken or an
/// intermediate segment is not an object.
pub fn set_nested(
    root: &mut Map<String, JsonValue>,
    path: &str,
    value: JsonValue,
) -> Result<(), JsonValue> {
    let (parent, leaf) = match navigate(root, path) {
        Some(found) => found,
        None => return Err(value),
    };
    if parent.contains_key(leaf) {
        return Err(value);
    }
    parent.insert(leaf.to_string(), value);
    Ok(())
}

/// Append `value` to the array at a dotted path, creating it when absent.
pub fn push_nested(
    root: &mut Map<String, JsonValue>,
    path: &str,
    value: JsonValue,
) -> Result<(), JsonValue> {
    let (parent, leaf) = match navigate(root, path) {
        Some(found) => found,
        None => return Err(value),
    };
    match parent.get_mut(leaf) {
        None => {
            parent.insert(leaf.to_string(), JsonValue::Array(vec![value]));
            Ok(())
        }
        Some(JsonValue::Array(items)) => {
            items.push(value);
            Ok(())
        }
        Some(_) => Err(value),
    }
}

/// Read the value at a dotted path.
pub fn get_nested<'a>(root: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut parts = path.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Walk to the parent object of the last segment, creating objects on the way.
fn navigate<'a, 'p>(
    root: &'a mut Map<String, JsonValue>,
    path: &'p str,
) -> Option<(&'a mut Map<String, JsonValue>, &'p str)> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return None;
    }
    let (prefix, leaf) = match path.rsplit_once('.') {
        Some((prefix, leaf)) => (Some(prefix), leaf),
        None => (None, path),
    };

    let mut current = root;
    if let Some(prefix) = prefix {
        for part in prefix.split('.') {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            match entry {
                JsonValue::Object(obj) => current = obj,
                _ => return None,
            }
        }
    }
    Some((current, leaf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_kind() {
        assert_eq!(ValueKind::of(&json!(1)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(1.5)), ValueKind::Float);
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!(null)), ValueKind::Null);
        assert!(ValueKind::of(&json!([])).is_container());
        assert!(!ValueKind::of(&json!(true)).is_container());
    }

    #[test]
    fn test_is_scalar_list() {
        assert!(is_scalar_list(&[json!("a"), json!(1)]));
        assert!(!is_scalar_list(&[]));
        assert!(!is_scalar_list(&[json!("a"), json!({})]));
    }

    #[test]
    fn test_set_nested_creates_objects() {
        let mut root = Map::new();
        set_nested(&mut root, "usage.total_tokens", json!(7)).unwrap();
        set_nested(&mut root, "usage.prompt_tokens", json!(5)).unwrap();
        assert_eq!(
            JsonValue::Object(root),
            json!({"usage": {"total_tokens": 7, "prompt_tokens": 5}})
        );
    }

    #[test]
    fn test_set_nested_collision_returns_value() {
        let mut root = Map::new();
        set_nested(&mut root, "model", json!("a")).unwrap();
        assert_eq!(set_nested(&mut root, "model", json!("b")), Err(json!("b")));
        assert_eq!(
            set_nested(&mut root, "model.name", json!("c")),
            Err(json!("c"))
        );
        assert_eq!(set_nested(&mut root, "", json!(1)), Err(json!(1)));
        assert_eq!(set_nested(&mut root, "a..b", json!(1)), Err(json!(1)));
    }

    #[test]
    fn test_push_nested_accumulates() {
        let mut root = Map::new();
        push_nested(&mut root, "chat.messages", json!(1)).unwrap();
        push_nested(&mut root, "chat.messages", json!(2)).unwrap();
        assert_eq!(get_nested(&root, "chat.messages"), Some(&json!([1, 2])));

        set_nested(&mut root, "scalar", json!("x")).unwrap();
        assert_eq!(push_nested(&mut root, "scalar", json!(3)), Err(json!(3)));
    }

    #[test]
    fn test_get_nested_missing() {
        let root = json!({"a": {"b": 1}});
        let root = root.as_object().unwrap();
        assert_eq!(get_nested(root, "a.b"), Some(&json!(1)));
        assert_eq!(get_nested(root, "a.c"), None);
        assert_eq!(get_nested(root, "a.b.c"), None);
    }
}
