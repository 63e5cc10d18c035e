//! Configuration module for the gatekeeper.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Drop the `X-API-CSRF` requirement for session calls.
    ///
    /// Ignored unless the binary was built with the `csrf-test-bypass` feature.
    #[serde(default)]
    pub test_mode: bool,
    /// Lifetime of a login session.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Users created at startup if missing.
    #[serde(default)]
    pub users: Vec<ConfiguredUser>,
    /// API keys registered at startup if missing.
    #[serde(default)]
    pub api_keys: Vec<ConfiguredApiKey>,
}

fn default_session_ttl_hours() -> i64 {
    8
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            session_ttl_hours: default_session_ttl_hours(),
            users: Vec::new(),
            api_keys: Vec::new(),
        }
    }
}

/// User account seeded from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfiguredUser {
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Argon2 PHC string of the normalized second-factor code. Users with one
    /// must complete `/v1/auth/login/second-factor` after the password step.
    #[serde(default)]
    pub second_factor_hash: Option<String>,
}

/// API key seeded from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfiguredApiKey {
    /// Full key in `<identifier>:<verifier>` form.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Email of the owning user.
    pub user_email: String,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (GATEKEEPER__*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default config
            .add_source(File::with_name("config/default").required(false))
            // Layer on local overrides
            .add_source(File::with_name("config/local").required(false))
            // Layer on environment variables with GATEKEEPER prefix
            .add_source(
                Environment::with_prefix("GATEKEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
