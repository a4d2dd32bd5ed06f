//! # Hashing
//!
//! - **SHA-256** for payload content digests. This is the algorithm named in
//!   `UpdateEnvelope::payload_hash`, so every node must agree on it.
//! - **BLAKE3** for local-only keys (issue pattern keys). Never sent on the
//!   wire, so it is free to change.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Returns true if `data` hashes to `expected_hex` (case-insensitive).
pub fn matches_content_digest(data: &[u8], expected_hex: &str) -> bool {
    let actual = Sha256::digest(data);
    let expected = match hex::decode(expected_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if expected.len() != actual.len() {
        return false;
    }
    // Fold the whole digest so the comparison does not exit early.
    actual
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Returns true if `value` looks like a SHA-256 hex digest.
pub fn is_content_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Short BLAKE3 key over several parts, separated so that
/// `("ab", "c")` and `("a", "bc")` differ.
pub fn pattern_key(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_known_vector() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_matches_content_digest() {
        let digest = content_digest(b"payload");
        assert!(matches_content_digest(b"payload", &digest));
        assert!(matches_content_digest(b"payload", &digest.to_uppercase()));
        assert!(!matches_content_digest(b"payload!", &digest));
        assert!(!matches_content_digest(b"payload", "zz"));
        assert!(!matches_content_digest(b"payload", "abcd"));
    }

    #[test]
    fn test_is_content_digest() {
        assert!(is_content_digest(&content_digest(b"")));
        assert!(!is_content_digest("abc"));
        assert!(!is_content_digest(&"g".repeat(64)));
    }

    #[test]
    fn test_pattern_key_separates_parts() {
        assert_ne!(pattern_key(&["ab", "c"]), pattern_key(&["a", "bc"]));
        assert_eq!(pattern_key(&["x", "y"]), pattern_key(&["x", "y"]));
        assert_eq!(pattern_key(&["x"]).len(), 16);
    }
}
