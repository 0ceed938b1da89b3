//! Hash Utilities
//! Content checksums recorded for every stored file
//! Created: 2025-06-04

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as lower-case hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
