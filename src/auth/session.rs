//! Session collaborator contract and the session identity fallback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::csrf::CsrfVerifier;
use crate::auth::Identity;
use crate::error::AuthResult;

/// An interactive login attached to the current request.
///
/// Owned by the session layer; the authenticator only borrows it.
#[async_trait]
pub trait Session: Send + Sync {
    /// Whether the session carries a completed login.
    async fn is_logged_in(&self) -> AuthResult<bool>;

    /// Identity of the logged-in user. Only meaningful when logged in.
    async fn logged_in_identity(&self) -> AuthResult<Option<Identity>>;

    /// Anti-forgery token store scoped to this session, if one is available.
    fn csrf(&self) -> Option<&dyn CsrfVerifier>;
}

/// Request extension carrying the session loaded for this request.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn Session>);

impl SessionHandle {
    pub fn new(session: impl Session + 'static) -> Self {
        Self(Arc::new(session))
    }

    pub fn as_session(&self) -> &dyn Session {
        self.0.as_ref()
    }
}

/// Identity of the current session login, if any.
pub async fn current_session_identity(
    session: Option<&dyn Session>,
) -> AuthResult<Option<Identity>> {
    let Some(session) = session else {
        return Ok(None);
    };

    if !session.is_logged_in().await? {
        return Ok(None);
    }

    session.logged_in_identity().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::FakeSession;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_absent_session_has_no_identity() {
        assert!(current_session_identity(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logged_out_session_has_no_identity() {
        let session = FakeSession::logged_out();
        assert!(current_session_identity(Some(&session))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_logged_in_session_yields_identity() {
        let user_id = Uuid::new_v4();
        let session = FakeSession::logged_in(Identity::session(user_id, "u@example.com"));
        let identity = current_session_identity(Some(&session))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, user_id);
        assert!(identity.is_session());
    }

    #[tokio::test]
    async fn test_session_failure_propagates() {
        let session = FakeSession::unavailable();
        assert!(current_session_identity(Some(&session)).await.is_err());
    }
}
