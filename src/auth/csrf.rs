//! CSRF gate for session-authenticated API calls.
//!
//! Only applies to session identities on methods that can mutate state. API
//! keys are not ambient credentials and never pass through here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{request::Parts, Method};

use crate::auth::session::Session;
use crate::error::AuthResult;

/// Namespace of the anti-forgery token that guards the JSON API.
///
/// Distinct from tokens used by other surfaces such as HTML forms.
pub const API_CSRF_NAMESPACE: &str = "api";

/// Header carrying the caller's copy of the API CSRF token.
pub const CSRF_HEADER: &str = "x-api-csrf";

/// Answer from a session's CSRF token store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfVerification {
    Valid,
    Mismatch,
    /// The session holds no token for the namespace.
    NoToken,
}

/// Per-session token store able to check a supplied token.
#[async_trait]
pub trait CsrfVerifier: Send + Sync {
    /// Rejections are values. `Err` is reserved for storage faults.
    async fn verify(&self, supplied: &str, namespace: &str) -> AuthResult<CsrfVerification>;
}

/// Deployment environment as seen by the CSRF gate.
pub trait Environment: Send + Sync {
    fn is_test_mode(&self) -> bool;
}

/// Environment derived from configuration.
///
/// The bypass flag is only honored by builds with the `csrf-test-bypass`
/// feature (and by the crate's own unit tests).
#[derive(Debug, Clone, Copy)]
pub struct RuntimeEnvironment {
    test_mode: bool,
}

impl RuntimeEnvironment {
    pub const BYPASS_COMPILED_IN: bool = cfg!(any(test, feature = "csrf-test-bypass"));

    pub fn new(test_mode_requested: bool) -> Self {
        Self {
            test_mode: test_mode_requested && Self::BYPASS_COMPILED_IN,
        }
    }

    pub fn production() -> Self {
        Self { test_mode: false }
    }
}

impl Environment for RuntimeEnvironment {
    fn is_test_mode(&self) -> bool {
        self.test_mode
    }
}

/// Outcome of the CSRF gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfDecision {
    /// Safe method, the gate does not apply.
    Exempt,
    Verified,
    /// Test mode let the request through without a valid token.
    Bypassed,
    /// No `X-API-CSRF` header on a mutating request.
    Missing,
    /// Token supplied but not accepted, or no token store on the session.
    Rejected,
}

impl CsrfDecision {
    pub fn allows(&self) -> bool {
        matches!(
            self,
            CsrfDecision::Exempt | CsrfDecision::Verified | CsrfDecision::Bypassed
        )
    }
}

/// Whether a method is defined as non-mutating.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

#[derive(Clone)]
pub struct CsrfGate {
    environment: Arc<dyn Environment>,
}

impl CsrfGate {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }

    /// Check the caller's anti-forgery token for a session request.
    pub async fn check(
        &self,
        parts: &Parts,
        session: &dyn Session,
        namespace: &str,
    ) -> AuthResult<CsrfDecision> {
        if is_safe_method(&parts.method) {
            return Ok(CsrfDecision::Exempt);
        }

        let test_mode = self.environment.is_test_mode();
        let supplied = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if supplied.is_empty() && !test_mode {
            return Ok(CsrfDecision::Missing);
        }

        let Some(verifier) = session.csrf() else {
            return Ok(CsrfDecision::Rejected);
        };

        if supplied.is_empty() {
            return Ok(CsrfDecision::Bypassed);
        }

        let decision = match verifier.verify(supplied, namespace).await? {
            CsrfVerification::Valid => CsrfDecision::Verified,
            // Test mode only waives the header, never a supplied token that fails.
            CsrfVerification::Mismatch | CsrfVerification::NoToken => CsrfDecision::Rejected,
        };

        Ok(decision)
    }
}
