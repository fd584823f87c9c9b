//! Utility functions shared across the normalizer

pub mod crypto;
pub mod file;
pub mod json;
pub mod string;
