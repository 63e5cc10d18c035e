//! API Gatekeeper - request authentication for JSON APIs.
//!
//! Resolves the caller of every API request from either an API key or an
//! interactive session, requiring a CSRF token for session calls that can
//! mutate state. The resolved identity is attached to the request for the
//! handlers that follow.

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;

use crate::auth::{ApiAuthenticator, Environment};
use crate::storage::GatekeeperRepository;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database repository.
    pub repository: GatekeeperRepository,
    /// Resolves the caller of each request.
    pub authenticator: ApiAuthenticator,
    /// Lifetime of new login sessions.
    pub session_ttl: chrono::Duration,
}

impl AppState {
    /// Wire the authenticator to the repository's key store.
    pub fn new(
        repository: GatekeeperRepository,
        environment: Arc<dyn Environment>,
        session_ttl: chrono::Duration,
    ) -> Self {
        let authenticator = ApiAuthenticator::new(Arc::new(repository.clone()), environment);
        Self {
            repository,
            authenticator,
            session_ttl,
        }
    }
}
