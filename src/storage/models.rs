//! Database models for the gatekeeper.
//!
//! These are the row types returned by SQLx queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{ApiKeyRecord, SessionRecord, User};
use crate::error::ServiceError;

fn parse_uuid(value: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ServiceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Database row for users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub second_factor_hash: Option<String>,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = ServiceError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            email: row.email,
            password_hash: row.password_hash,
            second_factor_hash: row.second_factor_hash,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Database row for api_keys table.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub identifier: String,
    pub verifier_hash: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = ServiceError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        Ok(ApiKeyRecord {
            identifier: row.identifier,
            verifier_hash: row.verifier_hash,
            user_id: parse_uuid(&row.user_id)?,
            name: row.name,
            created_at: parse_timestamp(&row.created_at)?,
            revoked_at: row.revoked_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Database row for sessions table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub login_complete: i64,
    pub created_at: String,
    pub expires_at: String,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = ServiceError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(SessionRecord {
            id: row.id,
            user_id: parse_uuid(&row.user_id)?,
            login_complete: row.login_complete != 0,
            created_at: parse_timestamp(&row.created_at)?,
            expires_at: parse_timestamp(&row.expires_at)?,
        })
    }
}
