// crates/server/src/routes/users.rs
//! Self-service user surface.
//!
//! - GET  /users/profile — the caller's own profile
//! - POST /users/logout — invalidate the current session
//! - POST /users/password-change — file a password-change request

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use finone_core::{PasswordChangeRequest, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/profile", get(profile))
        .route("/users/logout", post(logout))
        .route("/users/password-change", post(request_password_change))
}

async fn profile(current: CurrentUser) -> Json<UserProfile> {
    Json(current.user.profile())
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    message: &'static str,
}

/// POST /api/v1/users/logout — mark the session behind this token logged
/// out. Idempotent; racing logouts both see success.
async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> ApiResult<Json<LogoutResponse>> {
    state
        .db
        .logout_session(&current.token_hash, Utc::now())
        .await?;
    tracing::info!(user_id = %current.user.id, session_id = %current.session_id, "Logout");
    Ok(Json(LogoutResponse {
        message: "logged out",
    }))
}

#[derive(Debug, Deserialize)]
struct PasswordChangeBody {
    reason: String,
}

async fn request_password_change(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(body): Json<PasswordChangeBody>,
) -> ApiResult<(StatusCode, Json<PasswordChangeRequest>)> {
    let reason = body.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::InvalidRequest("reason is required".into()));
    }
    let request = state
        .db
        .create_password_change_request(
            current.user.id,
            &current.user.name,
            &current.user.email,
            reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}
