//! Mapping of classified fields onto canonical sections.

use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;

use crate::domain::compile::CompiledBundle;
use crate::domain::types::{CanonicalEvent, ConventionMatch, FieldIndex, FieldTypeId};
use crate::utils::json::{get_nested, push_nested, set_nested};

/// Canonical event plus placement counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    pub event: CanonicalEvent,
    pub mapped: usize,
    pub unmapped: usize,
    pub derived: usize,
}

/// Place every discovered field.
///
/// Each field ends up either in a section or under `unmapped` by its full
/// path; a second value for a single-valued target is never dropped.
pub fn map_fields(bundle: &CompiledBundle, index: &FieldIndex, convention: &ConventionMatch) -> MappingResult {
    let known = convention.known_id();
    let mut result = MappingResult::default();
    // transformed values, kept only for types that feed derived rules
    let mut sources: FxHashMap<FieldTypeId, Vec<JsonValue>> = FxHashMap::default();

    for field in &index.fields {
        let Some(target) = bundle.mapping_for(known, field.field_type) else {
            result.event.push_unmapped(&field.path, field.value.clone());
            result.unmapped += 1;
            continue;
        };

        let value = bundle
            .apply_transform(target.transform, &field.value)
            .unwrap_or_else(|| {
                tracing::debug!(
                    path = %field.path,
                    transform = bundle.transform(target.transform).map_or("", |t| t.name.as_str()),
                    "Transform does not accept value, keeping original"
                );
                field.value.clone()
            });
        let kept = feeds_derived(bundle, field.field_type).then(|| value.clone());

        let section = result.event.section_mut(target.section);
        let written = if target.collect {
            push_nested(section, &target.field, value)
        } else {
            set_nested(section, &target.field, value)
        };

        match written {
            Ok(()) => {
                result.mapped += 1;
                if let Some(value) = kept {
                    sources.entry(field.field_type).or_default().push(value);
                }
            }
            Err(_) => {
                tracing::debug!(
                    path = %field.path,
                    target = %format_args!("{}.{}", target.section, target.field),
                    "Target already set, keeping field unmapped"
                );
                result.event.push_unmapped(&field.path, field.value.clone());
                result.unmapped += 1;
            }
        }
    }

    result.derived = apply_derived(bundle, index, &sources, &mut result.event);
    result
}

fn feeds_derived(bundle: &CompiledBundle, field_type: FieldTypeId) -> bool {
    bundle.derived().iter().any(|d| d.sources.contains(&field_type))
}

fn apply_derived(
    bundle: &CompiledBundle,
    index: &FieldIndex,
    sources: &FxHashMap<FieldTypeId, Vec<JsonValue>>,
    event: &mut CanonicalEvent,
) -> usize {
    let mut count = 0;
    for rule in bundle.derived() {
        if rule.unless_present.is_some_and(|t| index.has_type(t)) {
            continue;
        }
        let section = event.section_mut(rule.section);
        if get_nested(section, &rule.field).is_some() {
            continue;
        }

        let inputs: Vec<&JsonValue> = rule
            .sources
            .iter()
            .filter_map(|t| sources.get(t))
            .flatten()
            .collect();
        if inputs.is_empty() {
            continue;
        }
        let Some(value) = rule.aggregate.apply(&inputs) else {
            tracing::debug!(target = %rule.field, "Derived inputs not aggregatable");
            continue;
        };
        if set_nested(section, &rule.field, value).is_ok() {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;
    use crate::domain::detection::detect;
    use crate::domain::discovery::{DiscoveryLimits, discover};
    use crate::domain::rules::{RuleSet, ValidationMode};

    fn run(bundle: &CompiledBundle, value: JsonValue) -> MappingResult {
        let attrs: Map<String, JsonValue> = match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        };
        let index = discover(bundle, &attrs, &DiscoveryLimits::default());
        let convention = detect(bundle, &index.paths);
        map_fields(bundle, &index, &convention)
    }

    #[test]
    fn test_maps_and_transforms_fields() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(
            &bundle,
            json!({"model": "gpt-4o", "choices": [{"finish_reason": "length"}], "temperature": "0.3", "stream": "true"}),
        );
        assert_eq!(result.event.config["model"], json!("gpt-4o"));
        assert_eq!(result.event.config["temperature"], json!(0.3));
        assert_eq!(result.event.config["stream"], json!(true));
        assert_eq!(result.event.outputs["finish_reason"], json!("length"));
        assert_eq!(result.mapped, 4);
        assert_eq!(result.unmapped, 0);
    }

    #[test]
    fn test_second_value_for_single_target_goes_unmapped() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(&bundle, json!({"model": "gpt-4o", "modelId": "gpt-4o-mini"}));
        assert_eq!(result.event.config["model"], json!("gpt-4o"));
        assert_eq!(result.event.unmapped["modelId"], json!("gpt-4o-mini"));
        assert_eq!(result.mapped, 1);
        assert_eq!(result.unmapped, 1);
    }

    #[test]
    fn test_collect_targets_accumulate_in_document_order() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(
            &bundle,
            json!({
                "gen_ai.prompt.0.role": "USER",
                "gen_ai.prompt.0.content": "first",
                "gen_ai.prompt.1.role": "assistant",
                "gen_ai.prompt.1.content": "second",
            }),
        );
        assert_eq!(result.event.inputs["prompts"], json!(["first", "second"]));
        assert_eq!(result.event.inputs["prompt_roles"], json!(["user", "assistant"]));
    }

    #[test]
    fn test_unsupported_transform_keeps_original() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(&bundle, json!({"temperature": "warm"}));
        assert_eq!(result.event.config["temperature"], json!("warm"));
        assert_eq!(result.mapped, 1);
    }

    #[test]
    fn test_derived_total_tokens() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(&bundle, json!({"usage": {"prompt_tokens": "5", "completion_tokens": 2}}));
        assert_eq!(result.event.metadata["usage"]["total_tokens"], json!(7));
        assert_eq!(result.derived, 1);
    }

    #[test]
    fn test_derived_skipped_when_source_type_present() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(
            &bundle,
            json!({"usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 9}}),
        );
        assert_eq!(result.event.metadata["usage"]["total_tokens"], json!(9));
        assert_eq!(result.derived, 0);
    }

    #[test]
    fn test_convention_override_beats_default() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(
            &bundle,
            json!({
                "modelId": "us.anthropic.claude-3-haiku",
                "output": {"message": {"role": "assistant", "content": [{"text": "hi"}]}},
                "stopReason": "end_turn",
            }),
        );
        assert_eq!(result.event.config["model"], json!("claude-3-haiku"));
        assert_eq!(result.event.outputs["finish_reason"], json!("stop"));
    }

    #[test]
    fn test_unknown_types_go_unmapped_by_full_path() {
        let bundle = CompiledBundle::builtin().expect("builtin");
        let result = run(&bundle, json!({"extra": {"items": [{"a": "x"}, {"a": "y"}]}}));
        assert_eq!(result.event.unmapped["extra.items.0.a"], json!("x"));
        assert_eq!(result.event.unmapped["extra.items.1.a"], json!("y"));
        assert_eq!(result.unmapped, 2);
    }

    #[test]
    fn test_unmapped_type_without_default_mapping() {
        let mut rules = RuleSet::builtin().expect("builtin rules");
        let doc = &mut rules.mappings[0].document;
        doc.mappings.retain(|m| m.field_type != "seed");
        let bundle = CompiledBundle::compile(&rules, ValidationMode::Permissive).expect("compile");

        let result = run(&bundle, json!({"seed": 42}));
        assert_eq!(result.event.unmapped["seed"], json!(42));
        assert!(result.event.config.is_empty());
    }
}
