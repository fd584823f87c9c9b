//! Convention detection.
//!
//! Scores every configured signature against the set of schema paths in a
//! record. The cost is O(k) in the number of signatures; each score is a
//! handful of hash lookups.

use rustc_hash::FxHashSet;

use crate::core::constants::{
    MIN_CONVENTION_CONFIDENCE, SIGNATURE_HASH_LEN, SYNTHETIC_CONVENTION_PREFIX,
    SYNTHETIC_NAME_HASH_LEN,
};
use crate::domain::compile::{CompiledBundle, CompiledSignature};
use crate::domain::types::{Convention, ConventionId, ConventionMatch};
use crate::utils::crypto::{sha256_hex_parts, short_hex};

/// Pick the best-scoring convention, or derive a synthetic identity when
/// nothing reaches [`MIN_CONVENTION_CONFIDENCE`].
pub fn detect(bundle: &CompiledBundle, paths: &FxHashSet<String>) -> ConventionMatch {
    let mut best: Option<(usize, f64, usize)> = None;
    for (idx, signature) in bundle.signatures().iter().enumerate() {
        let (confidence, matched) = score(signature, paths);
        // strict comparison keeps the earlier declaration on ties
        if best.is_none_or(|(_, top, _)| confidence > top) {
            best = Some((idx, confidence, matched));
        }
    }

    match best {
        Some((idx, confidence, matched)) if confidence >= MIN_CONVENTION_CONFIDENCE => {
            let signature = &bundle.signatures()[idx];
            ConventionMatch {
                name: signature.name.clone(),
                convention: u16::try_from(idx)
                    .map(|id| Convention::Known(ConventionId(id)))
                    .unwrap_or(Convention::Synthetic),
                confidence,
                matched_fields: matched,
                signature_hash: signature.hash.clone(),
            }
        }
        best => synthetic(bundle, paths, best.map_or(0.0, |(_, confidence, _)| confidence)),
    }
}

/// Weighted share of required and optional fields present in `paths`
pub fn score(signature: &CompiledSignature, paths: &FxHashSet<String>) -> (f64, usize) {
    let required = present(&signature.required, paths);
    let optional = present(&signature.optional, paths);

    let mut confidence = 0.0;
    if !signature.required.is_empty() {
        confidence += signature.required_weight * required as f64 / signature.required.len() as f64;
    }
    if !signature.optional.is_empty() {
        confidence += signature.optional_weight * optional as f64 / signature.optional.len() as f64;
    }
    (confidence.clamp(0.0, 1.0), required + optional)
}

fn present(fields: &[String], paths: &FxHashSet<String>) -> usize {
    fields.iter().filter(|f| paths.contains(f.as_str())).count()
}

/// Stable identity from the paths no signature knows about
fn synthetic(bundle: &CompiledBundle, paths: &FxHashSet<String>, confidence: f64) -> ConventionMatch {
    let mut basis: Vec<&str> = paths
        .iter()
        .map(String::as_str)
        .filter(|p| !bundle.signature_mentions(p))
        .collect();
    if basis.is_empty() {
        basis = paths.iter().map(String::as_str).collect();
    }
    basis.sort_unstable();

    let digest = sha256_hex_parts(basis.iter().copied());
    let name = format!(
        "{SYNTHETIC_CONVENTION_PREFIX}{}",
        short_hex(&digest, SYNTHETIC_NAME_HASH_LEN)
    );
    tracing::trace!(convention = %name, basis = basis.len(), confidence, "Derived synthetic convention");

    ConventionMatch {
        name,
        convention: Convention::Synthetic,
        confidence,
        matched_fields: basis.len(),
        signature_hash: short_hex(&digest, SIGNATURE_HASH_LEN).to_string(),
    }
}
