use super::*;
use serde_json::json;

fn builtin() -> CompiledBundle {
    CompiledBundle::builtin().unwrap()
}

fn type_of(bundle: &CompiledBundle, name: &str) -> FieldTypeId {
    bundle.field_type_id(name).unwrap()
}

#[test]
fn test_builtin_compiles_in_strict_mode() {
    let rules = RuleSet::builtin().unwrap();
    let bundle = CompiledBundle::compile(&rules, ValidationMode::Strict).unwrap();
    assert_eq!(bundle.format_version(), 1);
    assert_eq!(bundle.fingerprint().len(), 64);
    assert_eq!(bundle.field_type_name(FieldTypeId::UNKNOWN), "unknown");
}

#[test]
fn test_compilation_is_deterministic() {
    let rules = RuleSet::builtin().unwrap();
    let a = CompiledBundle::compile(&rules, ValidationMode::Permissive).unwrap();
    let b = CompiledBundle::compile(&rules, ValidationMode::Permissive).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.cache_salt(), b.cache_salt());
}

#[test]
fn test_fingerprint_tracks_content() {
    let mut rules = RuleSet::builtin().unwrap();
    let before = CompiledBundle::compile(&rules, ValidationMode::Permissive).unwrap();
    rules.classification[0].document.path_rules[0].confidence = Some(0.95);
    let after = CompiledBundle::compile(&rules, ValidationMode::Permissive).unwrap();
    assert_ne!(before.fingerprint(), after.fingerprint());
    assert_ne!(before, after);
}

#[test]
fn test_match_path_longest_suffix_wins() {
    let bundle = builtin();
    let provider = type_of(&bundle, "provider");
    let system = type_of(&bundle, "system_prompt");

    assert_eq!(bundle.match_path("gen_ai.system").unwrap().class.field_type, provider);
    assert_eq!(bundle.match_path("system").unwrap().class.field_type, system);
    assert_eq!(bundle.match_path("request.system").unwrap().class.field_type, system);
    assert_eq!(
        bundle.match_path("output.message.content.text").unwrap().class.field_type,
        type_of(&bundle, "completion_content")
    );
    assert_eq!(
        bundle.match_path("content.text").unwrap().class.field_type,
        type_of(&bundle, "content_text")
    );
    assert!(bundle.match_path("foo").is_none());
    assert!(bundle.match_path("").is_none());
}

#[test]
fn test_capture_flag() {
    let bundle = builtin();
    assert!(bundle.match_path("messages").unwrap().capture);
    assert!(!bundle.match_path("model").unwrap().capture);
}

#[test]
fn test_match_value_is_case_insensitive() {
    let bundle = builtin();
    let role = type_of(&bundle, "role");
    assert_eq!(bundle.match_value("assistant").unwrap().field_type, role);
    assert_eq!(bundle.match_value("Assistant ").unwrap().field_type, role);
    assert_eq!(
        bundle.match_value("END_TURN").unwrap().field_type,
        type_of(&bundle, "finish_reason")
    );
    assert!(bundle.match_value("bar").is_none());
    assert!(bundle.match_value(&"x".repeat(500)).is_none());
}

#[test]
fn test_match_prefix() {
    let bundle = builtin();
    let hit = bundle.match_prefix("GPT-4o-mini").unwrap();
    assert_eq!(hit.field_type, type_of(&bundle, "model"));
    assert!((hit.confidence - 0.7).abs() < f64::EPSILON);
    assert_eq!(
        bundle.match_prefix("chatcmpl-abc").unwrap().field_type,
        type_of(&bundle, "request_id")
    );
    assert!(bundle.match_prefix("hello").is_none());
}

#[test]
fn test_match_number() {
    let bundle = builtin();
    let ts = json!(1_700_000_000);
    let small = json!(42);
    let float = json!(1_700_000_000.5);
    assert_eq!(
        bundle.match_number(ts.as_number().unwrap()).unwrap().field_type,
        type_of(&bundle, "timestamp")
    );
    assert!(bundle.match_number(small.as_number().unwrap()).is_none());
    assert!(bundle.match_number(float.as_number().unwrap()).is_none());
}

#[test]
fn test_shape_hints() {
    let bundle = builtin();
    let message = json!({"role": "user", "content": "hi"});
    let hints: Vec<_> = bundle
        .shape_hints(message.as_object().unwrap())
        .map(|(key, class)| (key, bundle.field_type_name(class.field_type)))
        .collect();
    assert_eq!(hints, vec![("role", "role"), ("content", "message_content")]);

    let other = json!({"role": "user"});
    assert_eq!(bundle.shape_hints(other.as_object().unwrap()).count(), 0);
}

#[test]
fn test_mapping_override_precedence() {
    let bundle = builtin();
    let model = type_of(&bundle, "model");
    let bedrock = bundle.convention_id("bedrock_converse").unwrap();
    let openai = bundle.convention_id("openai_chat").unwrap();

    let default = bundle.mapping_for(None, model).unwrap();
    let via_openai = bundle.mapping_for(Some(openai), model).unwrap();
    let via_bedrock = bundle.mapping_for(Some(bedrock), model).unwrap();

    assert_eq!(default, via_openai);
    assert_eq!(via_bedrock.section, Section::Config);
    assert_eq!(via_bedrock.field, "model");
    assert_eq!(bundle.transform(via_bedrock.transform).unwrap().name, "model_name");
    assert!(bundle.mapping_for(None, FieldTypeId::UNKNOWN).is_none());
}

#[test]
fn test_apply_transform() {
    let bundle = builtin();
    let finish = type_of(&bundle, "finish_reason");
    let target = bundle.mapping_for(None, finish).unwrap();
    assert_eq!(
        bundle.apply_transform(target.transform, &json!("end_turn")),
        Some(json!("stop"))
    );
    assert_eq!(
        bundle.apply_transform(TransformId::IDENTITY, &json!({"a": 1})),
        Some(json!({"a": 1}))
    );
}

#[test]
fn test_signature_mentions() {
    let bundle = builtin();
    assert!(bundle.signature_mentions("choices"));
    assert!(bundle.signature_mentions("usage.input_tokens"));
    assert!(!bundle.signature_mentions("foo"));
}

#[test]
fn test_summary() {
    let bundle = builtin();
    let summary = bundle.summary();
    assert_eq!(summary.fingerprint, bundle.fingerprint());
    assert_eq!(summary.conventions.first().map(String::as_str), Some("openllmetry"));
    assert_eq!(summary.transforms.first().map(String::as_str), Some("identity"));
    assert_eq!(summary.derived, 1);
}

// ============================================================================
// Directory compilation
// ============================================================================

fn write_builtin_copy(dir: &Path) {
    for kind in ["classification", "signatures", "mappings", "transforms"] {
        let src = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("rules")
            .join(format!("{kind}.json"));
        std::fs::copy(src, dir.join(format!("{kind}.json"))).unwrap();
    }
}

#[test]
fn test_compile_dir_matches_builtin() {
    let dir = tempfile::tempdir().unwrap();
    write_builtin_copy(dir.path());
    let bundle = compile_dir(dir.path(), ValidationMode::Strict).unwrap();
    assert_eq!(bundle, builtin());
}

#[test]
fn test_compile_dir_reports_load_and_validation_issues_together() {
    let dir = tempfile::tempdir().unwrap();
    write_builtin_copy(dir.path());
    std::fs::write(dir.path().join("zz-broken.json"), "{").unwrap();
    std::fs::write(
        dir.path().join("zz-mappings.json"),
        r#"{"kind": "mappings", "version": 1, "mappings": [
            {"type": "seed", "convention": "openai_chat", "target": "config.seed", "transform": "nope"}
        ]}"#,
    )
    .unwrap();

    let err = compile_dir(dir.path(), ValidationMode::Permissive).unwrap_err();
    let issues = err.issues();
    assert_eq!(issues.len(), 1, "{err}");
    assert!(matches!(issues[0], RuleIssue::Parse { ref file, .. } if file == "zz-broken.json"));

    std::fs::remove_file(dir.path().join("zz-broken.json")).unwrap();
    let err = compile_dir(dir.path(), ValidationMode::Permissive).unwrap_err();
    assert_eq!(err.issues().len(), 1, "{err}");
    assert!(err.to_string().contains("undeclared transform 'nope'"));
}

#[test]
fn test_check_dir_keeps_warnings_separate() {
    let dir = tempfile::tempdir().unwrap();
    write_builtin_copy(dir.path());
    std::fs::write(
        dir.path().join("zz-transforms.json"),
        r#"{"kind": "transforms", "version": 1, "transforms": [{"name": "spare", "function": "lowercase"}]}"#,
    )
    .unwrap();

    let report = check_dir(dir.path()).unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(compile_dir(dir.path(), ValidationMode::Permissive).is_ok());
    assert!(compile_dir(dir.path(), ValidationMode::Strict).is_err());
}
