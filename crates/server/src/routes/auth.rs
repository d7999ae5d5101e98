// crates/server/src/routes/auth.rs
//! Public authentication surface.
//!
//! - POST /auth/login — exchange credentials for a bearer token
//! - POST /register — file a registration request for admin review

use crate::auth::{verify_password, AuthService};
use crate::error::{ApiError, ApiResult};
use crate::routes::{client_ip, user_agent};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use finone_core::{RegistrationRequest, UserProfile};
use finone_db::NewRegistrationRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/register", post(register))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// POST /api/v1/auth/login
///
/// Every rejection is the same InvalidCredentials; callers never learn
/// whether the email, the password, or the account state was at fault.
async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = body.email.trim().to_lowercase();
    let now = Utc::now();

    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !user.is_active || user.is_expired(now) {
        return Err(ApiError::InvalidCredentials);
    }
    if !verify_password(body.password, user.password_hash.clone()).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let (token, expires_at) = state.auth.mint(&user)?;
    let ip = client_ip(&headers);
    let ua = user_agent(&headers);
    let session = AuthService::new_session(&user, &token, expires_at, ip.clone(), ua.clone());
    state.db.insert_session(&session).await?;

    if let Err(e) = state
        .db
        .record_login(user.id, ip.as_deref(), ua.as_deref())
        .await
    {
        tracing::warn!(error = %e, "Failed to record login audit row");
    }
    tracing::info!(user_id = %user.id, session_id = %session.id, "Login");

    Ok(Json(LoginResponse {
        token,
        session_id: session.id,
        expires_at,
        user: user.profile(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_requested_searches")]
    pub requested_searches: i32,
}

fn default_requested_searches() -> i32 {
    500
}

/// POST /api/v1/register — create a PENDING registration request.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegistrationRequest>)> {
    let name = body.name.trim().to_string();
    let email = body.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest("name is required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::InvalidRequest("a valid email is required".into()));
    }
    if body.requested_searches <= 0 {
        return Err(ApiError::InvalidRequest(
            "requested_searches must be positive".into(),
        ));
    }

    let request = state
        .db
        .create_registration_request(&NewRegistrationRequest {
            name,
            email,
            phone: body.phone.trim().to_string(),
            requested_searches: body.requested_searches,
        })
        .await?;
    tracing::info!(request_id = %request.id, "Registration request created");
    Ok((StatusCode::CREATED, Json(request)))
}
