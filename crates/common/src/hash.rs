//! Digests attached to collected evidence.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}
