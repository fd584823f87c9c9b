//! Data layer: bounded in-memory caches

pub mod cache;
