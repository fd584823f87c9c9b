//! Rule documents: loading, merging and validation.
//!
//! A rule set is a directory of JSON documents, each tagged with a `kind`
//! and a format `version`. Documents of the same kind merge in file-name
//! order. Loading and validation never stop at the first problem; every
//! issue is collected so one run reports everything that is wrong.

mod document;
mod error;
mod loader;
mod validate;

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

pub use document::{
    ClassificationDocument, DerivedRule, DocumentKind, MappingRule, MappingsDocument,
    NumericRule, PathRule, PrefixRule, ShapeRule, SignatureRule, SignatureWeights,
    SignaturesDocument, TransformDefinition, TransformsDocument, ValueSetRule,
};
pub use error::{CompileError, RuleIssue, RuleRef, RuleWarning, ValidationErrors};
pub use loader::{LoadOutcome, load_dir, load_sources};
pub use validate::{ValidationReport, validate};

pub(crate) use validate::{ResolvedRules, resolve};

// =============================================================================
// Validation Mode
// =============================================================================

/// How warnings are treated at compile time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Warnings are logged
    #[default]
    Permissive,
    /// Warnings are errors
    Strict,
}

impl ValidationMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Permissive }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Permissive => write!(f, "permissive"),
            ValidationMode::Strict => write!(f, "strict"),
        }
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// A parsed document and the file it came from
#[derive(Debug, Clone)]
pub struct Located<T> {
    pub file: String,
    pub document: T,
}

/// All rule documents, grouped by kind in file-name order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub classification: Vec<Located<ClassificationDocument>>,
    pub signatures: Vec<Located<SignaturesDocument>>,
    pub mappings: Vec<Located<MappingsDocument>>,
    pub transforms: Vec<Located<TransformsDocument>>,
    /// Kinds with at least one document that failed to parse
    failed_kinds: FxHashSet<DocumentKind>,
    /// Documents whose kind could not be determined
    unidentified: usize,
}

impl RuleSet {
    /// Rules embedded in the binary
    pub fn builtin() -> Result<Self, CompileError> {
        let outcome = load_sources(loader::BUILTIN_DOCUMENTS.iter().copied());
        if outcome.issues.is_empty() {
            Ok(outcome.rules)
        } else {
            Err(CompileError::Invalid(ValidationErrors(outcome.issues)))
        }
    }

    pub fn document_count(&self, kind: DocumentKind) -> usize {
        match kind {
            DocumentKind::Classification => self.classification.len(),
            DocumentKind::Signatures => self.signatures.len(),
            DocumentKind::Mappings => self.mappings.len(),
            DocumentKind::Transforms => self.transforms.len(),
        }
    }

    /// True when every document that could hold rules of this kind was parsed,
    /// so references into it can be checked without spurious errors
    pub fn is_complete(&self, kind: DocumentKind) -> bool {
        self.unidentified == 0 && !self.failed_kinds.contains(&kind)
    }

    pub(crate) fn mark_failed(&mut self, kind: Option<DocumentKind>) {
        match kind {
            Some(kind) => {
                self.failed_kinds.insert(kind);
            }
            None => self.unidentified += 1,
        }
    }
}
