use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Location of a rule entry, e.g. `mappings.json: mappings[3] (finish_reason -> outputs.finish_reason)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRef {
    pub file: String,
    pub list: &'static str,
    pub index: usize,
    pub label: String,
}

impl RuleRef {
    pub fn new(file: &str, list: &'static str, index: usize, label: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            list,
            index,
            label: label.into(),
        }
    }
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}[{}]", self.file, self.list, self.index)?;
        if !self.label.is_empty() {
            write!(f, " ({})", self.label)?;
        }
        Ok(())
    }
}

/// A problem that makes a rule set unusable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleIssue {
    #[error("{file}: cannot read rule document: {message}")]
    Unreadable { file: String, message: String },

    #[error("{file}: invalid rule document: {message}")]
    Parse { file: String, message: String },

    #[error("{file}: unknown document kind '{kind}'")]
    UnknownKind { file: String, kind: String },

    #[error("{file}: unsupported rule format version {found} (supported: {supported})")]
    UnsupportedVersion {
        file: String,
        found: u64,
        supported: u32,
    },

    #[error("no '{kind}' rule document found")]
    MissingKind { kind: String },

    #[error("{rule}: undeclared transform '{transform}'")]
    UndeclaredTransform { rule: RuleRef, transform: String },

    #[error("{rule}: transform '{transform}' is {actual}, expected {expected}")]
    TransformKindMismatch {
        rule: RuleRef,
        transform: String,
        actual: String,
        expected: String,
    },

    #[error("{rule}: undeclared field type '{field_type}'")]
    UndeclaredFieldType { rule: RuleRef, field_type: String },

    #[error("{rule}: duplicate field type '{field_type}'")]
    DuplicateFieldType { rule: RuleRef, field_type: String },

    #[error("{rule}: field type '{field_type}' is reserved")]
    ReservedFieldType { rule: RuleRef, field_type: String },

    #[error("{rule}: duplicate path rule '{path}' (first declared at {first})")]
    DuplicatePathRule {
        rule: RuleRef,
        path: String,
        first: RuleRef,
    },

    #[error("{rule}: value '{value}' is already classified as '{existing}'")]
    AmbiguousValue {
        rule: RuleRef,
        value: String,
        existing: String,
    },

    #[error("{rule}: duplicate convention '{name}'")]
    DuplicateConvention { rule: RuleRef, name: String },

    #[error("{rule}: malformed signature: {reason}")]
    MalformedSignature { rule: RuleRef, reason: String },

    #[error("{rule}: a record with exactly these required fields is detected as '{by}'")]
    ShadowedSignature { rule: RuleRef, by: String },

    #[error("{rule}: duplicate mapping for {key} (first declared at {first})")]
    DuplicateMapping {
        rule: RuleRef,
        key: String,
        first: RuleRef,
    },

    #[error("{rule}: unknown convention '{convention}'")]
    UnknownConvention { rule: RuleRef, convention: String },

    #[error("{rule}: invalid target '{target}': {reason}")]
    InvalidTarget {
        rule: RuleRef,
        target: String,
        reason: String,
    },

    #[error("{rule}: confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { rule: RuleRef, value: f64 },

    #[error("{rule}: {reason}")]
    InvalidRule { rule: RuleRef, reason: String },

    #[error("{rule}: duplicate transform '{name}'")]
    DuplicateTransform { rule: RuleRef, name: String },

    #[error("{rule}: {source}")]
    InvalidTransform {
        rule: RuleRef,
        source: crate::domain::transforms::TransformError,
    },

    #[error("{rule}: inline transform code is not supported (field '{field}'); bind a built-in function instead")]
    InlineCode { rule: RuleRef, field: String },

    #[error("{rule}: unexpected field '{field}'")]
    UnexpectedField { rule: RuleRef, field: String },

    #[error("{0} (strict mode)")]
    Strict(RuleWarning),
}

/// A problem that is logged in permissive mode and fatal in strict mode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleWarning {
    #[error("{rule}: transform '{name}' is never used")]
    UnusedTransform { rule: RuleRef, name: String },

    #[error("{rule}: field type '{field_type}' is never produced by any classification rule")]
    UnclassifiedFieldType { rule: RuleRef, field_type: String },

    #[error("{rule}: field type '{field_type}' has no mapping rule")]
    UnmappedFieldType { rule: RuleRef, field_type: String },

    #[error("{rule}: mapping the reserved 'unknown' field type")]
    UnknownTypeMapped { rule: RuleRef },
}

/// Every issue found while loading and validating a rule set
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<RuleIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[RuleIssue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.0.len() == 1 { "" } else { "s" };
        write!(f, "rule set is invalid ({} issue{plural})", self.0.len())?;
        for issue in &self.0 {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Failure to produce a compiled bundle
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("rule directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("cannot read rule directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl CompileError {
    /// Individual rule issues, empty for directory-level failures
    pub fn issues(&self) -> &[RuleIssue] {
        match self {
            CompileError::Invalid(errors) => errors.issues(),
            _ => &[],
        }
    }
}
