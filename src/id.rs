//! ID generation utilities
//!
//! Query ids for log correlation and content ids for document chunks.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a unique query ID
///
/// Format: `q-{timestamp_ms}-{random_hex}`
/// Example: `q-1738300800123-a1b2`
pub fn generate_query_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("q-{}-{:04x}", timestamp, random)
}

/// Stable content id: first 12 hex chars of the SHA-256 of `content`
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..6])
}
