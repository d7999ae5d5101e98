// crates/server/tests/http_auth.rs
//! Routing and auth-gate tests that run without live databases: the bearer
//! check fails before any pool is touched, so lazy handles suffice.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use finone_core::config::AppConfig;
use finone_db::Database;
use finone_search::Analytics;
use finone_server::{create_app, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let mut config = AppConfig::default();
    config.jwt.secret = "integration-test-secret".into();
    let db = Database::connect_lazy(&config.database.postgres).expect("lazy pool");
    let analytics = Analytics::connect(&config.database.clickhouse);
    create_app(AppState::new(config, db, analytics))
}

async fn status_and_error(response: axum::response::Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
    let error = value
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or_default()
        .to_string();
    (status, error)
}

#[tokio::test]
async fn protected_route_without_token_is_401() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::get("/api/v1/users/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, error) = status_and_error(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error, "InvalidSession");
}

#[tokio::test]
async fn garbage_bearer_token_is_401() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::post("/api/v1/search")
                .header(header::AUTHORIZATION, "Bearer not.a.real.token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"query":"singh"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, error) = status_and_error(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error, "InvalidSession");
}

#[tokio::test]
async fn forged_token_signed_with_other_secret_is_401() {
    // Mint with a different secret; signature verification must reject it
    // before any session lookup happens.
    let forged = {
        let other = finone_server::AuthService::new(&finone_core::config::JwtConfig {
            secret: "attacker-secret".into(),
            expiry_hours: 24,
        });
        let user = finone_core::User {
            id: uuid::Uuid::new_v4(),
            name: "Mallory".into(),
            email: "m@example.com".into(),
            password_hash: String::new(),
            user_type: finone_core::UserType::Permanent,
            role: finone_core::Role::Admin,
            expires_at: None,
            is_active: true,
            max_searches_per_day: 500,
            max_exports_per_day: 3,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        other.mint(&user).unwrap().0
    };

    let app = test_app();
    let response = app
        .oneshot(
            Request::get("/api/v1/admin/sessions")
                .header(header::AUTHORIZATION, format!("Bearer {forged}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, error) = status_and_error(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error, "InvalidSession");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = test_app();
    let response = app
        .oneshot(Request::get("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_register_validates_body() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::post("/api/v1/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"","email":"not-an-email"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, error) = status_and_error(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error, "InvalidRequest");
}
