//! SHA-256 helpers.
//!
//! All content hashes in proofs are lowercase hex, 64 characters.

use sha2::{Digest, Sha256};

/// Hash bytes and return the lowercase hex digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic() {
        let data = b"verified jump capture";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn test_near_duplicate_inputs_differ() {
        // Same length, one byte apart
        assert_ne!(sha256_hex(b"jump-0001"), sha256_hex(b"jump-0002"));
        assert_ne!(sha256_hex(&[0u8; 1024]), sha256_hex(&{
            let mut buf = [0u8; 1024];
            buf[512] = 1;
            buf
        }));
    }
}
