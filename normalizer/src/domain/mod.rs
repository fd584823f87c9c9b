//! Normalization domain: rules, compilation, discovery, detection, mapping

pub mod compile;
pub mod detection;
pub mod discovery;
pub mod engine;
pub mod mapping;
pub mod rules;
pub mod transforms;
pub mod types;

pub use compile::{BundleSummary, CompiledBundle, check_dir, compile_dir};
pub use engine::{EngineOptions, Normalizer};
pub use rules::{CompileError, RuleIssue, RuleWarning, ValidationMode};
pub use types::{CanonicalEvent, Diagnostics, NormalizedEvent, Section};
