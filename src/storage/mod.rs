//! Storage layer for the gatekeeper.
//!
//! SQLite-backed record stores for users, API keys, sessions and CSRF tokens,
//! plus their implementations of the authentication collaborator traits.

mod key_store;
mod models;
mod repository;
mod session;

pub use repository::GatekeeperRepository;
pub use session::{
    expired_session_cookie, load_session, session_cookie, StoredCsrf, StoredSession,
    SESSION_COOKIE,
};

#[cfg(test)]
pub(crate) use repository::tests as test_support;

use crate::error::{AuthError, ServiceError};

/// Surface a storage failure to the authentication layer unchanged in kind.
pub(crate) fn store_error(error: ServiceError) -> AuthError {
    match error {
        ServiceError::Database(e) => AuthError::Database(e),
        other => AuthError::Store(other.to_string()),
    }
}
