//! API key records.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stored API key. Only the hash of the verifier half is kept.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    /// Public half of the key, used for lookup.
    pub identifier: String,
    /// SHA-256 of the secret half (hex).
    pub verifier_hash: String,
    pub user_id: Uuid,
    /// Human-readable name.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}
