//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, PrincipalKind};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Database connectivity.
    pub database: String,
    /// Timestamp.
    pub timestamp: String,
}

// ==================== Authentication ====================

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// User email.
    pub email: String,
    /// User password.
    pub password: String,
}

/// Second step of a login for users with a second factor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SecondFactorRequest {
    /// Second-factor code. Case and separators are ignored.
    pub code: String,
}

/// Login response. The session itself travels in the `Set-Cookie` header.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// User information.
    pub user: UserInfo,
    /// False while the session still waits for the second factor.
    pub login_complete: bool,
    /// Token to send as `X-API-CSRF` on mutating API calls. Only issued once
    /// the login is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    /// Session expiration in seconds.
    pub expires_in: i64,
}

/// User information.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    /// User ID.
    pub id: String,
    /// User email.
    pub email: String,
}

/// The API CSRF token of the current session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// The caller as resolved by the authentication layer.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    pub user_id: String,
    pub email: String,
    /// `session` or `api_key`.
    pub principal: String,
    /// Identifier of the API key, for API key callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        let (principal, key_id) = match identity.principal {
            PrincipalKind::Session => ("session", None),
            PrincipalKind::ApiKey { key_id } => ("api_key", Some(key_id)),
        };
        Self {
            user_id: identity.user_id.to_string(),
            email: identity.email,
            principal: principal.to_string(),
            key_id,
        }
    }
}

/// Response of the authenticated no-op endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct PingResponse {
    pub ok: bool,
    pub user_id: String,
}
