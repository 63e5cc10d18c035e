//! Identity and per-request authentication outcome types.

use serde::Serialize;
use uuid::Uuid;

/// How an identity proved itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Interactive login carried by a session.
    Session,
    /// Long-lived API key, identified by its public identifier.
    ApiKey { key_id: String },
}

/// An authenticated principal for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Stable id of the owning user account.
    pub user_id: Uuid,
    /// Email of the owning user account.
    pub email: String,
    pub principal: PrincipalKind,
}

impl Identity {
    /// Identity established through a logged-in session.
    pub fn session(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            principal: PrincipalKind::Session,
        }
    }

    /// Identity established through an API key.
    pub fn api_key(user_id: Uuid, email: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            principal: PrincipalKind::ApiKey {
                key_id: key_id.into(),
            },
        }
    }

    pub fn is_session(&self) -> bool {
        matches!(self.principal, PrincipalKind::Session)
    }

    pub fn is_api_key(&self) -> bool {
        matches!(self.principal, PrincipalKind::ApiKey { .. })
    }
}

/// Why a request ended up without an identity.
///
/// Kept for logging and tests only. Callers only ever see a generic
/// "unauthenticated" response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    /// No API key matched and no logged-in session was present.
    NoSession,
    /// Mutating session request without an `X-API-CSRF` header.
    CsrfMissing,
    /// Mutating session request whose CSRF token did not verify.
    CsrfRejected,
}

/// Result of one authentication pass over a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    ApiKey(Identity),
    Session(Identity),
    Anonymous(AnonymousReason),
}

impl AuthOutcome {
    /// The resolved identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::ApiKey(identity) | AuthOutcome::Session(identity) => Some(identity),
            AuthOutcome::Anonymous(_) => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            AuthOutcome::ApiKey(identity) | AuthOutcome::Session(identity) => Some(identity),
            AuthOutcome::Anonymous(_) => None,
        }
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthOutcome::ApiKey(_) => "api_key",
            AuthOutcome::Session(_) => "session",
            AuthOutcome::Anonymous(AnonymousReason::NoSession) => "anonymous",
            AuthOutcome::Anonymous(AnonymousReason::CsrfMissing) => "csrf_missing",
            AuthOutcome::Anonymous(AnonymousReason::CsrfRejected) => "csrf_rejected",
        }
    }
}

/// The identity attached to a request, readable by every downstream handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    pub fn get(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_identity_accessors() {
        let user_id = Uuid::new_v4();
        let outcome = AuthOutcome::ApiKey(Identity::api_key(user_id, "ops@example.com", "k1"));
        assert_eq!(outcome.identity().map(|i| i.user_id), Some(user_id));
        assert!(outcome.identity().is_some_and(Identity::is_api_key));

        let anonymous = AuthOutcome::Anonymous(AnonymousReason::CsrfRejected);
        assert!(anonymous.identity().is_none());
        assert_eq!(anonymous.kind(), "csrf_rejected");
    }

    #[test]
    fn test_principal_kind_serialization() {
        let identity = Identity::api_key(Uuid::nil(), "ops@example.com", "deploy");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["principal"]["kind"], "api_key");
        assert_eq!(json["principal"]["key_id"], "deploy");

        let identity = Identity::session(Uuid::nil(), "ops@example.com");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["principal"]["kind"], "session");
    }
}
