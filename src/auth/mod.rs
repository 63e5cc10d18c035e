//! Request authentication.
//!
//! Two independent ways to identify the caller of an API request:
//! - API key: bearer header, `X-API-Key`, `token` cookie or `api_key` query
//! - Session: an existing interactive login, with a CSRF token required for
//!   any method that can mutate state
//!
//! Only authentication lives here. What an identity may do is decided later.

mod api_key;
mod authenticator;
mod credential;
mod csrf;
mod identity;
mod middleware;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api_key::*;
pub use authenticator::*;
pub use credential::{extract_credential, Credential, CredentialSource};
pub use csrf::*;
pub use identity::*;
pub use middleware::*;
pub use session::*;

pub use crate::error::{AuthError, AuthResult};

pub(crate) use credential::cookie_value;
