/// Idempotency key generation
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub fn generate_idempotency_key(components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Key for the single alert a token's assessment may produce
pub fn alert_key(mint: &str, discovered_at: DateTime<Utc>) -> String {
    let discovered_ms = discovered_at.timestamp_millis().to_string();
    generate_idempotency_key(&["assessment", mint, &discovered_ms])
}
