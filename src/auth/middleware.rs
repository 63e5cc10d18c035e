//! Authentication middleware for axum.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::auth::session::SessionHandle;
use crate::auth::{ApiAuthenticator, AuthOutcome, CurrentIdentity, Identity};
use crate::error::ServiceError;

/// Resolve the caller and attach the result to the request.
///
/// Never rejects: anonymous requests continue with `CurrentIdentity(None)`.
/// Collaborator failures become a 500 instead of a silent anonymous request.
pub async fn attach_identity(
    State(authenticator): State<ApiAuthenticator>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let (mut parts, body) = request.into_parts();
    let session = parts.extensions.get::<SessionHandle>().cloned();

    let outcome = authenticator
        .authenticate(&parts, session.as_ref().map(SessionHandle::as_session))
        .await?;

    tracing::debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        outcome = outcome.kind(),
        user_id = ?outcome.identity().map(|identity| identity.user_id),
        "Request authenticated"
    );

    parts
        .extensions
        .insert(CurrentIdentity(outcome.identity().cloned()));
    parts.extensions.insert(outcome);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Reject requests that reached this point without an identity.
pub async fn require_identity(request: Request<Body>, next: Next) -> Result<Response, ServiceError> {
    if request.current_identity().is_none() {
        return Err(unauthenticated());
    }

    Ok(next.run(request).await)
}

fn unauthenticated() -> ServiceError {
    ServiceError::Unauthorized("Authentication required".to_string())
}

/// Extractor for handlers that need an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .and_then(|current| current.0.clone())
            .map(RequireIdentity)
            .ok_or_else(unauthenticated)
    }
}

/// Extension trait to read auth results from request extensions.
pub trait AuthExtensions {
    fn current_identity(&self) -> Option<&Identity>;
    fn auth_outcome(&self) -> Option<&AuthOutcome>;
}

impl<B> AuthExtensions for Request<B> {
    fn current_identity(&self) -> Option<&Identity> {
        self.extensions()
            .get::<CurrentIdentity>()
            .and_then(CurrentIdentity::get)
    }

    fn auth_outcome(&self) -> Option<&AuthOutcome> {
        self.extensions().get()
    }
}
