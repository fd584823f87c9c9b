use serde_json::{Map, Value as JsonValue, json};

use super::*;
use crate::domain::types::{FieldTypeId, Section};

fn bundle() -> CompiledBundle {
    CompiledBundle::builtin().expect("builtin rules compile")
}

fn object(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn type_of(bundle: &CompiledBundle, index: &FieldIndex, path: &str) -> String {
    let field = index
        .fields
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("no field at {path}"));
    bundle.field_type_name(field.field_type).to_string()
}

fn field<'a>(index: &'a FieldIndex, path: &str) -> &'a DiscoveredField {
    index
        .fields
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("no field at {path}"))
}

#[test]
fn test_flat_and_nested_keys_share_schema_path() {
    let bundle = bundle();
    let limits = DiscoveryLimits::default();
    let flat = discover(&bundle, &object(json!({"gen_ai.request.model": "gpt-4o"})), &limits);
    let nested = discover(
        &bundle,
        &object(json!({"gen_ai": {"request": {"model": "gpt-4o"}}})),
        &limits,
    );

    assert_eq!(flat.fields.len(), 1);
    assert_eq!(nested.fields.len(), 1);
    assert_eq!(flat.fields[0].schema_path, nested.fields[0].schema_path);
    assert_eq!(flat.fields[0].field_type, nested.fields[0].field_type);
    assert_eq!(flat.fields[0].structural_hash, nested.fields[0].structural_hash);
    assert_eq!(type_of(&bundle, &flat, "gen_ai.request.model"), "model");
}

#[test]
fn test_indices_dropped_from_schema_path() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]})),
        &DiscoveryLimits::default(),
    );
    let content = field(&index, "choices.0.message.content");
    assert_eq!(content.schema_path, "choices.message.content");
    assert_eq!(bundle.field_type_name(content.field_type), "completion_content");
    assert_eq!(content.source, ClassificationSource::PathRule);
    assert!(index.paths.contains("choices"));
    assert!(index.paths.contains("choices.message"));
}

#[test]
fn test_captured_container_is_single_leaf() {
    let bundle = bundle();
    let attrs = object(json!({
        "messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"}
        ]
    }));
    let index = discover(&bundle, &attrs, &DiscoveryLimits::default());

    assert_eq!(index.fields.len(), 1);
    assert_eq!(type_of(&bundle, &index, "messages"), "chat_history");
    assert_eq!(index.fields[0].value, attrs["messages"]);
}

#[test]
fn test_content_heuristics_in_priority_order() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({
            "a": "Assistant",
            "b": "claude-3-haiku",
            "c": 1_700_000_000,
            "d": "plain text",
        })),
        &DiscoveryLimits::default(),
    );

    assert_eq!(type_of(&bundle, &index, "a"), "role");
    assert_eq!(field(&index, "a").source, ClassificationSource::ValueSet);
    assert_eq!(type_of(&bundle, &index, "b"), "model");
    assert_eq!(field(&index, "b").source, ClassificationSource::Prefix);
    assert_eq!(type_of(&bundle, &index, "c"), "timestamp");
    assert_eq!(field(&index, "c").source, ClassificationSource::NumericRange);

    let unknown = field(&index, "d");
    assert_eq!(unknown.field_type, FieldTypeId::UNKNOWN);
    assert_eq!(unknown.source, ClassificationSource::Unknown);
    assert!(unknown.confidence > 0.0 && unknown.confidence < 0.4);
}

#[test]
fn test_shape_rule_classifies_message_keys() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({"turn": {"role": "narrator", "content": "once upon"}})),
        &DiscoveryLimits::default(),
    );

    assert_eq!(type_of(&bundle, &index, "turn.role"), "role");
    assert_eq!(field(&index, "turn.role").source, ClassificationSource::Shape);
    assert_eq!(type_of(&bundle, &index, "turn.content"), "message_content");
}

#[test]
fn test_list_tail_inherits_from_sampled_elements() {
    let bundle = bundle();
    let history: Vec<JsonValue> = (0..6)
        .map(|i| json!({"role": "user", "content": format!("turn {i}")}))
        .collect();
    let limits = DiscoveryLimits {
        list_sample: 2,
        ..DiscoveryLimits::default()
    };
    let index = discover(&bundle, &object(json!({"history": history})), &limits);

    assert_eq!(index.fields.len(), 12);
    assert_eq!(field(&index, "history.0.role").source, ClassificationSource::ValueSet);
    assert_eq!(field(&index, "history.0.content").source, ClassificationSource::Shape);
    for i in 2..6 {
        let role = field(&index, &format!("history.{i}.role"));
        assert_eq!(bundle.field_type_name(role.field_type), "role");
        assert_eq!(role.source, ClassificationSource::Inherited);
    }
}

#[test]
fn test_scalar_list_is_single_leaf() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({
            "stop": ["\n", "###"],
            "reasons": ["stop", "length"],
            "mixed": ["stop", "banana"],
        })),
        &DiscoveryLimits::default(),
    );

    assert_eq!(index.fields.len(), 3);
    assert_eq!(type_of(&bundle, &index, "stop"), "stop_sequences");
    assert_eq!(type_of(&bundle, &index, "reasons"), "finish_reason");
    assert_eq!(field(&index, "mixed").field_type, FieldTypeId::UNKNOWN);
}

#[test]
fn test_empty_containers_are_leaves() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({"a": {}, "b": [], "c": null})),
        &DiscoveryLimits::default(),
    );
    assert_eq!(index.fields.len(), 3);
    assert_eq!(field(&index, "a").value, json!({}));
    assert_eq!(field(&index, "b").value, json!([]));
}

#[test]
fn test_depth_bound_keeps_container_whole() {
    let bundle = bundle();
    let mut value = json!("bottom");
    for _ in 0..20 {
        value = json!({"n": value});
    }
    let attrs = object(value);
    let limits = DiscoveryLimits {
        max_depth: 4,
        ..DiscoveryLimits::default()
    };
    let index = discover(&bundle, &attrs, &limits);

    assert_eq!(index.fields.len(), 1);
    let leaf = &index.fields[0];
    assert_eq!(leaf.path, "n.n.n.n");
    assert!(leaf.value.is_object());
    assert_eq!(leaf.field_type, FieldTypeId::UNKNOWN);
}

#[test]
fn test_deep_nesting_does_not_recurse() {
    let bundle = bundle();
    let mut value = json!(1);
    for _ in 0..2_000 {
        value = json!({"x": value});
    }
    let attrs = object(value);
    let limits = DiscoveryLimits {
        max_depth: usize::MAX,
        max_nodes: usize::MAX,
        ..DiscoveryLimits::default()
    };
    let index = discover(&bundle, &attrs, &limits);
    assert_eq!(index.fields.len(), 1);
    assert_eq!(index.fields[0].value, json!(1));
}

#[test]
fn test_node_budget_emits_remaining_fields_unclassified() {
    let bundle = bundle();
    let mut attrs = Map::new();
    attrs.insert("model".to_string(), json!("gpt-4o"));
    for i in 0..9 {
        attrs.insert(format!("k{i}"), json!(i));
    }
    attrs.insert("temperature".to_string(), json!(0.2));
    let limits = DiscoveryLimits {
        max_nodes: 4,
        ..DiscoveryLimits::default()
    };
    let index = discover(&bundle, &attrs, &limits);

    assert!(index.truncated);
    assert_eq!(index.fields.len(), 11);
    assert_eq!(type_of(&bundle, &index, "model"), "model");
    assert_eq!(field(&index, "temperature").field_type, FieldTypeId::UNKNOWN);
    assert_eq!(field(&index, "temperature").value, json!(0.2));
}

#[test]
fn test_document_order_preserved() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({"z": 1, "a": {"y": 2, "b": 3}, "m": 4})),
        &DiscoveryLimits::default(),
    );
    let order: Vec<&str> = index.fields.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(order, vec!["z", "a.y", "a.b", "m"]);
}

#[test]
fn test_index_groups_by_type_and_section() {
    let bundle = bundle();
    let index = discover(
        &bundle,
        &object(json!({"model": "gpt-4o", "temperature": 0.5, "mystery": true})),
        &DiscoveryLimits::default(),
    );
    let model = bundle.field_type_id("model").expect("model type");

    assert!(index.has_type(model));
    assert_eq!(index.of_type(model).count(), 1);
    assert_eq!(index.by_section.get(&Section::Config).map(Vec::len), Some(2));
    assert_eq!(index.by_type.get(&FieldTypeId::UNKNOWN).map(Vec::len), Some(1));
}

#[test]
fn test_signature_ignores_path_classified_values() {
    let bundle = bundle();
    let limits = DiscoveryLimits::default();
    let a = object(json!({"model": "gpt-4o", "usage": {"prompt_tokens": 3}}));
    let b = object(json!({"model": "claude-3", "usage": {"prompt_tokens": 90}}));
    assert_eq!(
        walk(&bundle, &a, &limits).signature,
        walk(&bundle, &b, &limits).signature
    );
}

#[test]
fn test_signature_tracks_content_classified_values() {
    let bundle = bundle();
    let limits = DiscoveryLimits::default();
    let a = object(json!({"who": "assistant"}));
    let b = object(json!({"who": "narrator"}));
    let c = object(json!({"who": 7}));
    let sig = |attrs: &Map<String, JsonValue>| walk(&bundle, attrs, &limits).signature;

    assert_ne!(sig(&a), sig(&b));
    assert_ne!(sig(&a), sig(&c));
}

#[test]
fn test_signature_distinguishes_flat_from_nested() {
    let bundle = bundle();
    let limits = DiscoveryLimits::default();
    let flat = object(json!({"output.message.role": "assistant", "stopReason": "end_turn"}));
    let nested = object(json!({"output": {"message": {"role": "assistant"}}, "stopReason": "end_turn"}));

    let flat_walk = walk(&bundle, &flat, &limits);
    let nested_walk = walk(&bundle, &nested, &limits);
    assert_ne!(flat_walk.signature, nested_walk.signature);
    assert!(!flat_walk.paths.contains("output.message"));
    assert!(nested_walk.paths.contains("output.message"));
}

#[test]
fn test_classify_matches_leaf_count() {
    let bundle = bundle();
    let limits = DiscoveryLimits::default();
    let attrs = object(json!({"model": "gpt-4o", "extra": [1, 2], "nested": {"x": "y"}}));
    let walked = walk(&bundle, &attrs, &limits);
    let classes = classify(&bundle, &walked, &limits);
    assert_eq!(classes.len(), walked.leaves.len());
    assert!(classes.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
}
