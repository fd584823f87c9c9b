use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::document::DocumentKind;
use super::error::{CompileError, RuleIssue};
use super::{Located, RuleSet};
use crate::core::constants::RULE_FORMAT_VERSION;
use crate::utils::file::list_json_files;

/// Default rule documents shipped with the crate
pub(super) const BUILTIN_DOCUMENTS: &[(&str, &str)] = &[
    (
        "classification.json",
        include_str!("../../../rules/classification.json"),
    ),
    ("signatures.json", include_str!("../../../rules/signatures.json")),
    ("mappings.json", include_str!("../../../rules/mappings.json")),
    ("transforms.json", include_str!("../../../rules/transforms.json")),
];

/// Parsed documents plus every load-time issue
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub rules: RuleSet,
    pub issues: Vec<RuleIssue>,
}

/// Load every `*.json` document in `dir`.
///
/// Unreadable and malformed documents are reported in the outcome; only a
/// missing or unlistable directory is an error.
pub fn load_dir(dir: &Path) -> Result<LoadOutcome, CompileError> {
    if !dir.is_dir() {
        return Err(CompileError::MissingDirectory(dir.to_path_buf()));
    }
    let files = list_json_files(dir).map_err(|source| CompileError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::debug!(dir = %dir.display(), files = files.len(), "Loading rule documents");

    let mut outcome = LoadOutcome::default();
    let mut sources: Vec<(String, String)> = Vec::with_capacity(files.len());
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match fs::read_to_string(path) {
            Ok(content) => sources.push((name, content)),
            Err(e) => {
                outcome.rules.mark_failed(None);
                outcome.issues.push(RuleIssue::Unreadable {
                    file: name,
                    message: e.to_string(),
                });
            }
        }
    }

    for (name, content) in &sources {
        load_document(&mut outcome, name, content);
    }
    Ok(outcome)
}

/// Load documents from `(file name, content)` pairs, in the given order.
pub fn load_sources<'a>(sources: impl IntoIterator<Item = (&'a str, &'a str)>) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for (name, content) in sources {
        load_document(&mut outcome, name, content);
    }
    outcome
}

fn load_document(outcome: &mut LoadOutcome, file: &str, content: &str) {
    let raw: JsonValue = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            outcome.rules.mark_failed(None);
            outcome.issues.push(RuleIssue::Parse {
                file: file.to_string(),
                message: e.to_string(),
            });
            return;
        }
    };

    let Some(kind_name) = raw.get("kind").and_then(JsonValue::as_str) else {
        outcome.rules.mark_failed(None);
        outcome.issues.push(RuleIssue::Parse {
            file: file.to_string(),
            message: "missing string field \"kind\"".to_string(),
        });
        return;
    };
    let Some(kind) = DocumentKind::parse(kind_name) else {
        outcome.rules.mark_failed(None);
        outcome.issues.push(RuleIssue::UnknownKind {
            file: file.to_string(),
            kind: kind_name.to_string(),
        });
        return;
    };

    match raw.get("version").and_then(JsonValue::as_u64) {
        Some(v) if v == u64::from(RULE_FORMAT_VERSION) => {}
        Some(found) => {
            outcome.rules.mark_failed(Some(kind));
            outcome.issues.push(RuleIssue::UnsupportedVersion {
                file: file.to_string(),
                found,
                supported: RULE_FORMAT_VERSION,
            });
            return;
        }
        None => {
            outcome.rules.mark_failed(Some(kind));
            outcome.issues.push(RuleIssue::Parse {
                file: file.to_string(),
                message: "missing integer field \"version\"".to_string(),
            });
            return;
        }
    }

    tracing::trace!(file, %kind, "Parsing rule document");
    let rules = &mut outcome.rules;
    let parsed = match kind {
        DocumentKind::Classification => push_typed(&mut rules.classification, file, raw),
        DocumentKind::Signatures => push_typed(&mut rules.signatures, file, raw),
        DocumentKind::Mappings => push_typed(&mut rules.mappings, file, raw),
        DocumentKind::Transforms => push_typed(&mut rules.transforms, file, raw),
    };
    if let Err(message) = parsed {
        outcome.rules.mark_failed(Some(kind));
        outcome.issues.push(RuleIssue::Parse {
            file: file.to_string(),
            message,
        });
    }
}

fn push_typed<T: DeserializeOwned>(
    target: &mut Vec<Located<T>>,
    file: &str,
    raw: JsonValue,
) -> Result<(), String> {
    let document = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    target.push(Located {
        file: file.to_string(),
        document,
    });
    Ok(())
}
