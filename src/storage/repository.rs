//! Repository layer for database operations.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::auth::{hash_verifier, SplitKey};
use crate::config::{ConfiguredApiKey, ConfiguredUser};
use crate::domain::{generate_secret, hash_session_token, ApiKeyRecord, SessionRecord, User};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::models::{ApiKeyRow, SessionRow, UserRow};

/// Repository for users, API keys, sessions and CSRF tokens.
#[derive(Clone)]
pub struct GatekeeperRepository {
    pool: SqlitePool,
}

impl GatekeeperRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> ServiceResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                second_factor_hash TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                identifier TEXT PRIMARY KEY,
                verifier_hash TEXT NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                revoked_at TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_api_keys_user_id ON api_keys(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                login_complete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS csrf_tokens (
                session_id TEXT NOT NULL,
                namespace TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, namespace),
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Users ====================

    /// Create a new user.
    pub async fn create_user(&self, user: &User) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, second_factor_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.second_factor_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    // ==================== API Keys ====================

    /// Store a new API key.
    pub async fn create_api_key(&self, key: &ApiKeyRecord) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (identifier, verifier_hash, user_id, name, created_at, revoked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key.identifier)
        .bind(&key.verifier_hash)
        .bind(key.user_id.to_string())
        .bind(&key.name)
        .bind(key.created_at.to_rfc3339())
        .bind(key.revoked_at.map(|ts| ts.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up an API key by its public identifier, revoked or not.
    pub async fn find_api_key(&self, identifier: &str) -> ServiceResult<Option<ApiKeyRecord>> {
        let row: Option<ApiKeyRow> = sqlx::query_as("SELECT * FROM api_keys WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Revoke an API key. Returns false if no active key had that identifier.
    pub async fn revoke_api_key(&self, identifier: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = ? WHERE identifier = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Sessions ====================

    /// Start a session for a user. Returns the raw cookie token and the record.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        login_complete: bool,
        ttl: Duration,
    ) -> ServiceResult<(String, SessionRecord)> {
        let token = generate_secret();
        let record = SessionRecord::new(&token, user_id, login_complete, ttl);

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, login_complete, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id.to_string())
        .bind(if record.login_complete { 1 } else { 0 })
        .bind(record.created_at.to_rfc3339())
        .bind(record.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok((token, record))
    }

    /// Find the session for a raw cookie token.
    pub async fn find_session(&self, token: &str) -> ServiceResult<Option<SessionRecord>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(hash_session_token(token))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Mark a pending, unexpired session as fully logged in.
    ///
    /// Returns false if the session is unknown, expired or already complete.
    pub async fn complete_login(&self, session_id: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET login_complete = 1
            WHERE id = ? AND login_complete = 0 AND expires_at > ?
            "#,
        )
        .bind(session_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a session and its CSRF tokens.
    pub async fn delete_session(&self, session_id: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM csrf_tokens WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Delete sessions past their expiry along with their CSRF tokens.
    ///
    /// Returns the number of sessions removed.
    pub async fn purge_expired_sessions(&self) -> ServiceResult<u64> {
        // RFC 3339 UTC timestamps order correctly as text.
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM csrf_tokens
            WHERE session_id IN (SELECT id FROM sessions WHERE expires_at <= ?)
            "#,
        )
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(purged)
    }

    // ==================== CSRF Tokens ====================

    /// Get the session's token for a namespace, minting one if absent.
    pub async fn csrf_token(&self, session_id: &str, namespace: &str) -> ServiceResult<String> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO csrf_tokens (session_id, namespace, token, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(namespace)
        .bind(generate_secret())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_csrf_token(session_id, namespace)
            .await?
            .ok_or_else(|| ServiceError::Internal("CSRF token vanished after insert".to_string()))
    }

    /// Get the session's token for a namespace without minting one.
    pub async fn find_csrf_token(
        &self,
        session_id: &str,
        namespace: &str,
    ) -> ServiceResult<Option<String>> {
        let token: Option<(String,)> = sqlx::query_as(
            "SELECT token FROM csrf_tokens WHERE session_id = ? AND namespace = ?",
        )
        .bind(session_id)
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token.map(|(token,)| token))
    }

    // ==================== Seeding ====================

    /// Create configured users and API keys that do not exist yet.
    pub async fn seed(
        &self,
        users: &[ConfiguredUser],
        api_keys: &[ConfiguredApiKey],
    ) -> ServiceResult<()> {
        for configured in users {
            if self.get_user_by_email(&configured.email).await?.is_some() {
                continue;
            }
            let mut user =
                User::new_with_password(configured.email.clone(), configured.password_hash.clone());
            if let Some(code_hash) = &configured.second_factor_hash {
                user = user.with_second_factor(code_hash.clone());
            }
            self.create_user(&user).await?;
            tracing::info!(user_id = %user.id, email = %user.email, "Seeded user");
        }

        for configured in api_keys {
            let split = SplitKey::parse(&configured.key).ok_or_else(|| {
                ServiceError::Config(format!(
                    "API key '{}' must have the form <identifier>:<verifier>",
                    configured.name
                ))
            })?;

            if self.find_api_key(split.identifier).await?.is_some() {
                continue;
            }

            let owner = self
                .get_user_by_email(&configured.user_email)
                .await?
                .ok_or_else(|| {
                    ServiceError::Config(format!(
                        "API key '{}' references unknown user {}",
                        configured.name, configured.user_email
                    ))
                })?;

            self.create_api_key(&ApiKeyRecord {
                identifier: split.identifier.to_string(),
                verifier_hash: hash_verifier(split.verifier),
                user_id: owner.id,
                name: configured.name.clone(),
                created_at: Utc::now(),
                revoked_at: None,
            })
            .await?;
            tracing::info!(key_id = %split.identifier, user_id = %owner.id, "Seeded API key");
        }

        Ok(())
    }
}
