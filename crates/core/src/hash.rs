//! SHA-256 hashing utilities.
//!
//! Hashes travel through the protocol as lowercase hex strings. The genesis
//! sentinel uses the literal `"0"` and the merkle root of an empty block is
//! the empty string, so there is no fixed-width wrapper type here.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Raw SHA-256 digest of raw bytes.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hex-encoded SHA-256 over the concatenation of two hex strings.
///
/// The concatenation operates on the string form, not on decoded bytes.
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_deterministic() {
        assert_eq!(sha256_hex(b"hello world"), sha256_hex(b"hello world"));
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }

    #[test]
    fn test_sha256_is_lowercase_hex() {
        let h = sha256_hex(b"case check");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_pair_matches_concatenation() {
        let a = sha256_hex(b"a");
        let b = sha256_hex(b"b");
        let joined = format!("{}{}", a, b);
        assert_eq!(hash_pair(&a, &b), sha256_hex(joined.as_bytes()));
    }

    #[test]
    fn test_hash_pair_order_matters() {
        let a = sha256_hex(b"a");
        let b = sha256_hex(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_bytes_and_hex_agree() {
        assert_eq!(hex::encode(sha256_bytes(b"agree")), sha256_hex(b"agree"));
    }
}
