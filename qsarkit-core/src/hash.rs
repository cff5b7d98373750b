//! SHA-256 hashing for model artifact integrity.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(
            sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_tracks_content() {
        let a = sha256(b"{\"estimator\":\"ridge\"}");
        assert_eq!(a.len(), 64);
        assert_eq!(a, sha256(b"{\"estimator\":\"ridge\"}"));
        assert_ne!(a, sha256(b"{\"estimator\":\"lasso\"}"));
    }
}
