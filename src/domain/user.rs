//! User domain types.
//!
//! Users own API keys and log in interactively with a password. Users with a
//! second factor only finish logging in once they present its code.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// A user account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// User's email address.
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip)]
    pub password_hash: String,
    /// Argon2 PHC string of the normalized second-factor code, if enrolled.
    #[serde(skip)]
    pub second_factor_hash: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an already hashed password.
    pub fn new_with_password(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            second_factor_hash: None,
            created_at: Utc::now(),
        }
    }

    /// Enroll a second factor from an already hashed code.
    pub fn with_second_factor(mut self, code_hash: String) -> Self {
        self.second_factor_hash = Some(code_hash);
        self
    }

    /// Whether a password login leaves the session pending.
    pub fn requires_second_factor(&self) -> bool {
        self.second_factor_hash.is_some()
    }

    /// Verify a password against the stored hash.
    ///
    /// Malformed stored hashes never verify.
    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.password_hash) else {
            tracing::warn!(user_id = %self.id, "Stored password hash is malformed");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Verify a second-factor code. Users without one never verify.
    pub fn verify_second_factor(&self, code: &str) -> bool {
        let Some(stored) = self.second_factor_hash.as_deref() else {
            return false;
        };
        let normalized = normalize_second_factor(code);
        if normalized.is_empty() {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(stored) else {
            tracing::warn!(user_id = %self.id, "Stored second factor hash is malformed");
            return false;
        };
        Argon2::default()
            .verify_password(normalized.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Strip separators and case so `abcd-efgh` and `ABCDEFGH` match.
pub fn normalize_second_factor(code: &str) -> String {
    code.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Hash a second-factor code for storage.
pub fn hash_second_factor(code: &str) -> ServiceResult<String> {
    hash_password(&normalize_second_factor(code))
}

/// Hash a password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| ServiceError::Internal(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {}", e)))
}
