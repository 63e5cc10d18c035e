//! Database-backed sessions for the authentication layer.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::auth::{cookie_value, CsrfVerification, CsrfVerifier, Identity, Session, SessionHandle};
use crate::domain::SessionRecord;
use crate::error::{AuthResult, ServiceError};
use crate::storage::{store_error, GatekeeperRepository};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "gatekeeper_session";

/// CSRF tokens of one stored session.
pub struct StoredCsrf {
    repository: GatekeeperRepository,
    session_id: String,
}

#[async_trait]
impl CsrfVerifier for StoredCsrf {
    async fn verify(&self, supplied: &str, namespace: &str) -> AuthResult<CsrfVerification> {
        let stored = self
            .repository
            .find_csrf_token(&self.session_id, namespace)
            .await
            .map_err(store_error)?;

        let Some(stored) = stored else {
            return Ok(CsrfVerification::NoToken);
        };

        if bool::from(stored.as_bytes().ct_eq(supplied.as_bytes())) {
            Ok(CsrfVerification::Valid)
        } else {
            Ok(CsrfVerification::Mismatch)
        }
    }
}

/// A session row loaded for the current request.
pub struct StoredSession {
    repository: GatekeeperRepository,
    record: SessionRecord,
    csrf: StoredCsrf,
}

impl StoredSession {
    pub fn new(repository: GatekeeperRepository, record: SessionRecord) -> Self {
        let csrf = StoredCsrf {
            repository: repository.clone(),
            session_id: record.id.clone(),
        };
        Self {
            repository,
            record,
            csrf,
        }
    }
}

#[async_trait]
impl Session for StoredSession {
    async fn is_logged_in(&self) -> AuthResult<bool> {
        Ok(self.record.is_logged_in(Utc::now()))
    }

    async fn logged_in_identity(&self) -> AuthResult<Option<Identity>> {
        let user = self
            .repository
            .get_user(self.record.user_id)
            .await
            .map_err(store_error)?;

        Ok(user.map(|user| Identity::session(user.id, user.email)))
    }

    fn csrf(&self) -> Option<&dyn CsrfVerifier> {
        Some(&self.csrf)
    }
}

/// Load the session named by the session cookie into request extensions.
///
/// Inserts both the raw `SessionRecord` and a `SessionHandle` for the
/// authentication layer. Unknown tokens leave the request without a session.
pub async fn load_session(
    State(repository): State<GatekeeperRepository>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    if let Some(token) = cookie_value(request.headers(), SESSION_COOKIE) {
        if let Some(record) = repository.find_session(&token).await? {
            request.extensions_mut().insert(record.clone());
            request
                .extensions_mut()
                .insert(SessionHandle::new(StoredSession::new(repository, record)));
        }
    }

    Ok(next.run(request).await)
}

/// `Set-Cookie` value for a freshly created session.
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}
