//! API Gatekeeper server.
//!
//! Serves the authentication endpoints and resolves the caller of every
//! request from an API key or a CSRF-protected session.

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

use api_gatekeeper::api::build_router;
use api_gatekeeper::auth::RuntimeEnvironment;
use api_gatekeeper::config::Config;
use api_gatekeeper::logging;
use api_gatekeeper::storage::GatekeeperRepository;
use api_gatekeeper::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        // Missing .env is expected in production
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize logging
    logging::init();

    tracing::info!("Starting API Gatekeeper v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        session_ttl_hours = config.auth.session_ttl_hours,
        "Configuration loaded"
    );

    // Connect to database
    let pool = SqlitePool::connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    // Initialize repository and schema
    let repository = GatekeeperRepository::new(pool);
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    repository
        .seed(&config.auth.users, &config.auth.api_keys)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to seed configured users and keys");
            anyhow::anyhow!("Seeding error: {}", e)
        })?;

    let purged = repository.purge_expired_sessions().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to purge expired sessions");
        anyhow::anyhow!("Session cleanup error: {}", e)
    })?;

    tracing::info!(
        users = config.auth.users.len(),
        expired_sessions_purged = purged,
        api_keys = config.auth.api_keys.len(),
        "Database connected and schema initialized"
    );

    let environment = RuntimeEnvironment::new(config.auth.test_mode);
    if config.auth.test_mode && !RuntimeEnvironment::BYPASS_COMPILED_IN {
        tracing::warn!(
            "auth.test_mode is set but this build lacks the csrf-test-bypass feature; ignoring"
        );
    } else if config.auth.test_mode {
        tracing::warn!("CSRF test bypass is ACTIVE - session calls skip X-API-CSRF checks");
    }

    let state = AppState::new(
        repository,
        Arc::new(environment),
        chrono::Duration::hours(config.auth.session_ttl_hours),
    );

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
