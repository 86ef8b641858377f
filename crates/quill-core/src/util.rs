//! Shared utility functions used across multiple modules.

use std::hash::{Hash, Hasher};

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

pub fn trim_trailing_slash(value: &str) -> &str {
    value.trim_end_matches('/')
}

/// Stable-within-process hash of a user id, safe to put in logs.
pub fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}
