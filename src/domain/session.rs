//! Interactive login sessions and their anti-forgery tokens.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A stored login session. The raw cookie token is never kept, only its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// SHA-256 of the session cookie token (hex).
    pub id: String,
    pub user_id: Uuid,
    /// False while the login still awaits a second step.
    pub login_complete: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(token: &str, user_id: Uuid, login_complete: bool, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: hash_session_token(token),
            user_id,
            login_complete,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A session counts as a login only once complete and before expiry.
    pub fn is_logged_in(&self, now: DateTime<Utc>) -> bool {
        self.login_complete && !self.is_expired(now)
    }
}

/// Hash a session cookie token for storage/lookup.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a random 32-byte secret, hex encoded.
///
/// Used for both session cookie tokens and CSRF tokens.
pub fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
