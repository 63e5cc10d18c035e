//! HTTP API layer for the gatekeeper.
//!
//! Provides login, identity and health endpoints on top of the auth layers.

pub mod handlers;
mod routes;
mod types;

pub use routes::{build_router, ApiDoc};
