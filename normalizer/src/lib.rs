//! Span attribute normalizer.
//!
//! Compiles declarative rule documents into an immutable bundle and turns
//! arbitrary LLM span attributes into provider-neutral canonical events.

mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

pub use domain::{
    CanonicalEvent, CompileError, CompiledBundle, Diagnostics, EngineOptions, NormalizedEvent,
    Normalizer, Section, ValidationMode, compile_dir,
};
