//! Hashing for admin API keys.
//!
//! Keys are shown once at creation and only their SHA-256 digest is stored.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Visible prefix of every admin API key.
pub const API_KEY_PREFIX: &str = "cd_";

/// Hash a secret with a domain-separation prefix, hex encoded.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"claimdrop-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate an admin API key with the `cd_` prefix.
pub fn generate_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, Uuid::new_v4().simple())
}

/// Short, log-safe form of a key (prefix plus the first few characters).
pub fn key_hint(key: &str) -> String {
    let visible: String = key.chars().take(API_KEY_PREFIX.len() + 6).collect();
    format!("{}...", visible)
}
