use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

/// Stable 64-bit hash of document text, used as the analysis cache key.
pub fn content_hash(content: &str) -> u64 {
    let mut hasher = XxHash64::default();
    content.hash(&mut hasher);
    hasher.finish()
}
