//! The API authentication decision procedure.
//!
//! Order of evaluation, single pass:
//! 1. API key from the request, resolved against the key store
//! 2. Logged-in session identity
//! 3. Safe methods accept the session identity as is
//! 4. Mutating methods additionally need a valid `X-API-CSRF` token

use std::sync::Arc;

use axum::http::request::Parts;

use crate::auth::api_key::{ApiKeyResolver, KeyStore};
use crate::auth::credential::extract_credential;
use crate::auth::csrf::{is_safe_method, CsrfDecision, CsrfGate, Environment, API_CSRF_NAMESPACE};
use crate::auth::session::{current_session_identity, Session};
use crate::auth::{AnonymousReason, AuthOutcome};
use crate::error::AuthResult;

/// Resolves the caller of an API request. Holds no per-request state.
#[derive(Clone)]
pub struct ApiAuthenticator {
    resolver: ApiKeyResolver,
    csrf_gate: CsrfGate,
}

impl ApiAuthenticator {
    pub fn new(key_store: Arc<dyn KeyStore>, environment: Arc<dyn Environment>) -> Self {
        Self {
            resolver: ApiKeyResolver::new(key_store),
            csrf_gate: CsrfGate::new(environment),
        }
    }

    /// Decide who, if anyone, is making this request.
    ///
    /// Unauthenticated requests are `Ok(AuthOutcome::Anonymous(_))`. Errors
    /// only come from collaborators that could not answer.
    pub async fn authenticate(
        &self,
        parts: &Parts,
        session: Option<&dyn Session>,
    ) -> AuthResult<AuthOutcome> {
        if let Some(credential) = extract_credential(parts) {
            if let Some(identity) = self.resolver.resolve(&credential).await? {
                return Ok(AuthOutcome::ApiKey(identity));
            }
        }

        let Some(identity) = current_session_identity(session).await? else {
            return Ok(AuthOutcome::Anonymous(AnonymousReason::NoSession));
        };

        if is_safe_method(&parts.method) {
            return Ok(AuthOutcome::Session(identity));
        }

        // A logged-in identity implies a session is present.
        let Some(session) = session else {
            return Ok(AuthOutcome::Anonymous(AnonymousReason::NoSession));
        };

        let outcome = match self
            .csrf_gate
            .check(parts, session, API_CSRF_NAMESPACE)
            .await?
        {
            decision if decision.allows() => AuthOutcome::Session(identity),
            CsrfDecision::Missing => AuthOutcome::Anonymous(AnonymousReason::CsrfMissing),
            _ => AuthOutcome::Anonymous(AnonymousReason::CsrfRejected),
        };

        Ok(outcome)
    }
}
