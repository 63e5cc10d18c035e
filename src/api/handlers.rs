//! HTTP request handlers.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    Extension, Json,
};

use crate::api::types::*;
use crate::auth::{RequireIdentity, API_CSRF_NAMESPACE};
use crate::domain::SessionRecord;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{expired_session_cookie, session_cookie};
use crate::AppState;

/// Health check endpoint.
///
/// GET /v1/health
#[utoipa::path(
    get,
    path = "/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check database connectivity
    let db_status = match sqlx::query("SELECT 1")
        .fetch_one(state.repository.pool())
        .await
    {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ==================== Authentication Endpoints ====================

/// Log in with email and password to start a session.
///
/// POST /v1/auth/login
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ServiceResult<impl IntoResponse> {
    let user = state
        .repository
        .get_user_by_email(&request.email)
        .await?
        .filter(|user| user.verify_password(&request.password))
        .ok_or_else(|| {
            tracing::warn!(email = %request.email, "Failed login attempt");
            ServiceError::Unauthorized("Invalid email or password".to_string())
        })?;

    let purged = state.repository.purge_expired_sessions().await?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired sessions");
    }

    let login_complete = !user.requires_second_factor();
    let (token, record) = state
        .repository
        .create_session(user.id, login_complete, state.session_ttl)
        .await?;
    let csrf_token = if login_complete {
        Some(
            state
                .repository
                .csrf_token(&record.id, API_CSRF_NAMESPACE)
                .await?,
        )
    } else {
        None
    };

    if login_complete {
        tracing::info!(user_id = %user.id, email = %user.email, "User logged in");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Login awaiting second factor");
    }

    let expires_in = state.session_ttl.num_seconds();
    Ok((
        [(SET_COOKIE, session_cookie(&token, expires_in))],
        Json(LoginResponse {
            user: UserInfo {
                id: user.id.to_string(),
                email: user.email,
            },
            login_complete,
            csrf_token,
            expires_in,
        }),
    ))
}

/// Finish a pending login with the second-factor code.
///
/// POST /v1/auth/login/second-factor
#[utoipa::path(
    post,
    path = "/v1/auth/login/second-factor",
    request_body = SecondFactorRequest,
    responses(
        (status = 200, description = "Login complete", body = LoginResponse),
        (status = 400, description = "Login is already complete"),
        (status = 401, description = "No pending login or invalid code")
    ),
    security(("session_cookie" = [])),
    tag = "auth"
)]
pub async fn complete_second_factor(
    State(state): State<AppState>,
    session: Option<Extension<SessionRecord>>,
    Json(request): Json<SecondFactorRequest>,
) -> ServiceResult<Json<LoginResponse>> {
    let now = chrono::Utc::now();
    let Some(Extension(record)) = session.filter(|Extension(record)| !record.is_expired(now))
    else {
        return Err(ServiceError::Unauthorized("No pending login".to_string()));
    };
    if record.login_complete {
        return Err(ServiceError::BadRequest(
            "Login is already complete".to_string(),
        ));
    }

    let user = state
        .repository
        .get_user(record.user_id)
        .await?
        .filter(|user| user.verify_second_factor(&request.code))
        .ok_or_else(|| {
            tracing::warn!(user_id = %record.user_id, "Failed second factor attempt");
            ServiceError::Unauthorized("Invalid second factor code".to_string())
        })?;

    if !state.repository.complete_login(&record.id).await? {
        return Err(ServiceError::Unauthorized("No pending login".to_string()));
    }
    let csrf_token = state
        .repository
        .csrf_token(&record.id, API_CSRF_NAMESPACE)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User logged in");

    Ok(Json(LoginResponse {
        user: UserInfo {
            id: user.id.to_string(),
            email: user.email,
        },
        login_complete: true,
        csrf_token: Some(csrf_token),
        expires_in: (record.expires_at - now).num_seconds(),
    }))
}

/// Get the API CSRF token of the current session.
///
/// GET /v1/auth/csrf
#[utoipa::path(
    get,
    path = "/v1/auth/csrf",
    responses(
        (status = 200, description = "CSRF token for X-API-CSRF", body = CsrfTokenResponse),
        (status = 400, description = "Caller is not using a session"),
        (status = 401, description = "Not authenticated")
    ),
    security(("session_cookie" = [])),
    tag = "auth"
)]
pub async fn get_csrf_token(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    session: Option<Extension<SessionRecord>>,
) -> ServiceResult<Json<CsrfTokenResponse>> {
    let Some(Extension(record)) = session.filter(|_| identity.is_session()) else {
        return Err(ServiceError::BadRequest(
            "CSRF tokens are only issued to session logins".to_string(),
        ));
    };

    let csrf_token = state
        .repository
        .csrf_token(&record.id, API_CSRF_NAMESPACE)
        .await?;

    Ok(Json(CsrfTokenResponse { csrf_token }))
}

/// End the current session.
///
/// POST /v1/auth/logout
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session ended"),
        (status = 400, description = "Caller is not using a session"),
        (status = 401, description = "Not authenticated")
    ),
    security(("session_cookie" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    session: Option<Extension<SessionRecord>>,
) -> ServiceResult<impl IntoResponse> {
    // API key callers never pass the CSRF gate, so they cannot end a session.
    let Some(Extension(record)) = session
        .filter(|Extension(record)| identity.is_session() && record.user_id == identity.user_id)
    else {
        return Err(ServiceError::BadRequest(
            "Only session logins can log out".to_string(),
        ));
    };

    state.repository.delete_session(&record.id).await?;
    tracing::info!(user_id = %identity.user_id, "User logged out");

    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, expired_session_cookie())],
    ))
}

// ==================== Identity Endpoints ====================

/// Get the identity of the caller.
///
/// GET /v1/me
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Current identity", body = IdentityResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("api_key" = []), ("bearer_auth" = []), ("session_cookie" = [])),
    tag = "identity"
)]
pub async fn get_current_identity(
    RequireIdentity(identity): RequireIdentity,
) -> Json<IdentityResponse> {
    Json(identity.into())
}

/// State-changing no-op, useful to check CSRF handling from a client.
///
/// POST /v1/me/ping
#[utoipa::path(
    post,
    path = "/v1/me/ping",
    responses(
        (status = 200, description = "Caller is authenticated", body = PingResponse),
        (status = 401, description = "Not authenticated or missing CSRF token")
    ),
    security(("api_key" = []), ("bearer_auth" = []), ("session_cookie" = [])),
    tag = "identity"
)]
pub async fn ping(RequireIdentity(identity): RequireIdentity) -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        user_id: identity.user_id.to_string(),
    })
}
