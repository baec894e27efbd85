//! Stable row keys for persisted entries.

use sha2::{Digest, Sha256};

use crate::model::RequestKey;

/// SHA-256 over the normalized method and URL, hex encoded.
pub fn compute_key_hash(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b"\n");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}
