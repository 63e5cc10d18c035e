//! Logging and tracing setup for the gatekeeper.
//!
//! Per-request authentication decisions are logged at `debug` under
//! `api_gatekeeper::auth`. API keys only ever appear as an 8-char prefix.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "api_gatekeeper=info,tower_http=info";

/// Directive that surfaces the outcome of every authenticated request.
pub const AUTH_DECISIONS_DIRECTIVE: &str = "api_gatekeeper::auth=debug";

/// Environment switch for [`AUTH_DECISIONS_DIRECTIVE`]. Read before the
/// config files, since logging starts first.
pub const AUTH_DECISIONS_ENV: &str = "GATEKEEPER_LOG_AUTH_DECISIONS";

/// Default filter directives, optionally with auth decision logging.
pub fn default_directives(log_auth_decisions: bool) -> String {
    if log_auth_decisions {
        format!("{},{}", DEFAULT_FILTER, AUTH_DECISIONS_DIRECTIVE)
    } else {
        DEFAULT_FILTER.to_string()
    }
}

fn auth_decisions_requested() -> bool {
    std::env::var(AUTH_DECISIONS_ENV)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Initialize the tracing subscriber with JSON formatting.
///
/// `RUST_LOG` wins when set. Otherwise uses [`DEFAULT_FILTER`], plus
/// [`AUTH_DECISIONS_DIRECTIVE`] when `GATEKEEPER_LOG_AUTH_DECISIONS=1`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(auth_decisions_requested())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Initialize tracing for tests (human-readable format, no JSON).
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(default_directives(true))
        .try_init();
}
