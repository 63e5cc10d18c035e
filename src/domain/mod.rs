//! Domain types for the gatekeeper.
//!
//! Accounts, API keys and login sessions as stored by the record stores.

mod api_key;
mod session;
mod user;

pub use api_key::*;
pub use session::*;
pub use user::*;
