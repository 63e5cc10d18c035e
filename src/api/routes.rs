//! Route definitions for the API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::auth::{attach_identity, require_identity, CSRF_HEADER};
use crate::storage::{load_session, SESSION_COOKIE};
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    SESSION_COOKIE.to_string(),
                    format!("Session login. Mutating calls also need the {} header.", CSRF_HEADER),
                ))),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check,
        handlers::login,
        handlers::complete_second_factor,
        handlers::get_csrf_token,
        handlers::logout,
        handlers::get_current_identity,
        handlers::ping,
    ),
    components(schemas(
        crate::api::types::HealthResponse,
        crate::api::types::LoginRequest,
        crate::api::types::SecondFactorRequest,
        crate::api::types::LoginResponse,
        crate::api::types::UserInfo,
        crate::api::types::CsrfTokenResponse,
        crate::api::types::IdentityResponse,
        crate::api::types::PingResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Session login and CSRF tokens"),
        (name = "identity", description = "Endpoints that require an authenticated caller"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "API Gatekeeper",
        version = "0.1.0",
        description = "Resolves API-key and session identities for API requests",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router.
///
/// Every route sees `CurrentIdentity` in its extensions. Routes under
/// `protected` additionally reject requests without one.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/v1/me", get(handlers::get_current_identity))
        .route("/v1/me/ping", post(handlers::ping))
        .route("/v1/auth/csrf", get(handlers::get_csrf_token))
        .route("/v1/auth/logout", post(handlers::logout))
        .route_layer(middleware::from_fn(require_identity));

    let public = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/auth/login", post(handlers::login))
        .route(
            "/v1/auth/login/second-factor",
            post(handlers::complete_second_factor),
        );

    Router::new()
        .merge(protected)
        .merge(public)
        // The last layer added runs first, so the session is loaded before identity.
        .layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            attach_identity,
        ))
        .layer(middleware::from_fn_with_state(
            state.repository.clone(),
            load_session,
        ))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::RuntimeEnvironment;
    use crate::domain::{hash_password, hash_second_factor, User};
    use crate::storage::GatekeeperRepository;
    use crate::storage::test_support::{create_test_user, setup_test_db};

    const API_KEY: &str = "ci:0123456789abcdef";

    async fn test_app() -> Router {
        test_app_with_repository().await.0
    }

    async fn test_app_with_repository() -> (Router, GatekeeperRepository) {
        crate::logging::init_test();
        let repository = setup_test_db().await;
        let owner = create_test_user(&repository, "web@example.com").await;
        repository
            .create_api_key(&crate::domain::ApiKeyRecord {
                identifier: "ci".to_string(),
                verifier_hash: crate::auth::hash_verifier("0123456789abcdef"),
                user_id: owner.id,
                name: "CI".to_string(),
                created_at: chrono::Utc::now(),
                revoked_at: None,
            })
            .await
            .unwrap();

        let app = build_router(AppState::new(
            repository.clone(),
            Arc::new(RuntimeEnvironment::production()),
            chrono::Duration::hours(1),
        ));
        (app, repository)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router) -> (String, String) {
        login_as(app, "web@example.com").await
    }

    /// Log in and return the `name=value` cookie pair plus the CSRF token.
    async fn login_as(app: &Router, email: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"email": email, "password": "pw"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap()
            .to_string();
        let body = json_body(response).await;
        let csrf = body["csrf_token"].as_str().unwrap().to_string();
        (cookie, csrf)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = test_app()
            .await
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["database"], "connected");
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_rejected() {
        let response = test_app()
            .await
            .oneshot(Request::get("/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_api_key_caller() {
        let response = test_app()
            .await
            .oneshot(
                Request::post("/v1/me/ping")
                    .header("X-API-Key", API_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_app()
            .await
            .oneshot(
                Request::get("/v1/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", API_KEY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["principal"], "api_key");
        assert_eq!(body["key_id"], "ci");
        assert_eq!(body["email"], "web@example.com");
    }

    #[tokio::test]
    async fn test_session_caller_needs_csrf_for_mutations() {
        let app = test_app().await;
        let (cookie, csrf) = login(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/v1/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["principal"], "session");

        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/me/ping")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/me/ping")
                    .header(header::COOKIE, &cookie)
                    .header("X-API-CSRF", "forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::post("/v1/me/ping")
                    .header(header::COOKIE, &cookie)
                    .header("X-API-CSRF", &csrf)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_csrf_endpoint_returns_login_token() {
        let app = test_app().await;
        let (cookie, csrf) = login(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/v1/auth/csrf")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["csrf_token"], csrf.as_str());

        let response = app
            .oneshot(
                Request::get("/v1/auth/csrf")
                    .header("X-API-Key", API_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let response = test_app()
            .await
            .oneshot(
                Request::post("/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"email": "web@example.com", "password": "nope"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = test_app().await;
        let (cookie, csrf) = login(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/auth/logout")
                    .header(header::COOKIE, &cookie)
                    .header("X-API-CSRF", &csrf)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::get("/v1/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_caller_cannot_end_a_session() {
        let (app, repository) = test_app_with_repository().await;
        create_test_user(&repository, "other@example.com").await;
        let (cookie, _csrf) = login_as(&app, "other@example.com").await;

        // The key belongs to web@example.com, the cookie to other@example.com.
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/auth/logout")
                    .header("X-API-Key", API_KEY)
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let token = cookie
            .strip_prefix(&format!("{}=", SESSION_COOKIE))
            .unwrap();
        assert!(repository.find_session(token).await.unwrap().is_some());

        let response = app
            .oneshot(
                Request::get("/v1/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["principal"], "session");
        assert_eq!(body["email"], "other@example.com");
    }

    async fn post_json(app: &Router, uri: &str, cookie: &str, body: Value) -> Response {
        app.clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, cookie)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_factor_login() {
        let (app, repository) = test_app_with_repository().await;
        let user = User::new_with_password("mfa@example.com".to_string(), hash_password("pw").unwrap())
            .with_second_factor(hash_second_factor("ABCD-EFGH-JKLM").unwrap());
        repository.create_user(&user).await.unwrap();

        let response = post_json(
            &app,
            "/v1/auth/login",
            "",
            json!({"email": "mfa@example.com", "password": "pw"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap()
            .to_string();
        let body = json_body(response).await;
        assert_eq!(body["login_complete"], false);
        assert!(body.get("csrf_token").is_none());

        // A pending login is not an identity yet.
        let response = app
            .clone()
            .oneshot(
                Request::get("/v1/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let second_factor = "/v1/auth/login/second-factor";
        let response = post_json(&app, second_factor, &cookie, json!({"code": "ABCD-EFGH-XXXX"})).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = post_json(&app, second_factor, &cookie, json!({"code": "abcd efgh jklm"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["login_complete"], true);
        let csrf = body["csrf_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/me/ping")
                    .header(header::COOKIE, &cookie)
                    .header("X-API-CSRF", &csrf)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_json(&app, second_factor, &cookie, json!({"code": "ABCD-EFGH-JKLM"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_second_factor_needs_a_session() {
        let app = test_app().await;
        let response = post_json(
            &app,
            "/v1/auth/login/second-factor",
            "",
            json!({"code": "ABCD-EFGH-JKLM"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_openapi_lists_security_schemes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("api_key"));
        assert!(components.security_schemes.contains_key("session_cookie"));
    }
}
