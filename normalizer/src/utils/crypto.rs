//! Hashing helpers for fingerprints and synthetic identities

use sha2::{Digest, Sha256};

/// SHA256 over a sequence of parts, each terminated by a NUL separator.
///
/// The separator keeps `["ab", "c"]` and `["a", "bc"]` distinct.
pub fn sha256_hex_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// First `len` hex characters of a digest (identity labels, log fields)
pub fn short_hex(digest: &str, len: usize) -> &str {
    &digest[..len.min(digest.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(sha256_hex_parts(["abc"]), sha256_hex_parts(["abc"]));
        assert_ne!(sha256_hex_parts(["abc"]), sha256_hex_parts(["abd"]));
        assert_eq!(sha256_hex_parts(["abc"]).len(), 64);
    }

    #[test]
    fn test_parts_are_separated() {
        assert_ne!(
            sha256_hex_parts(["ab", "c"]),
            sha256_hex_parts(["a", "bc"])
        );
    }

    #[test]
    fn test_short_hex() {
        let digest = sha256_hex_parts(["x"]);
        assert_eq!(short_hex(&digest, 12).len(), 12);
        assert_eq!(short_hex("abc", 12), "abc");
    }
}
