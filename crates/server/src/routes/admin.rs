// crates/server/src/routes/admin.rs
//! Administrative surface. Every route requires an ADMIN session.
//!
//! - /admin/users            — CRUD; admin accounts can never be deleted
//! - /admin/users/{id}/password — direct password set
//! - /admin/sessions         — inspection, per-user kill, stale purge
//! - /admin/reset/daily-search-counts — manual quota reset
//! - /admin/import/csv[-path] — bulk ingestion into the people store
//! - /admin/registration-requests, /admin/password-requests — moderation

use crate::auth::{hash_password, AdminUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use finone_core::{
    PasswordChangeRequest, RegistrationRequest, RequestStatus, Role, SessionSummary, UserProfile,
    UserType,
};
use finone_db::{NewUser, ReviewDecision, UserUpdate};
use finone_search::{ingest_csv, CsvIngestOptions, FieldPositions};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", post(create_user).get(list_users))
        .route(
            "/admin/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/admin/users/{id}/password", post(set_password))
        .route("/admin/users/{id}/sessions", delete(kill_user_sessions))
        .route("/admin/sessions", get(list_sessions))
        .route("/admin/sessions/cleanup", post(cleanup_sessions))
        .route("/admin/reset/daily-search-counts", post(reset_daily_counts))
        .route("/admin/import/csv", post(import_csv_upload))
        .route("/admin/import/csv-path", post(import_csv_path))
        .route("/admin/registration-requests", get(list_registrations))
        .route(
            "/admin/registration-requests/{id}/review",
            post(review_registration),
        )
        .route("/admin/password-requests", get(list_password_requests))
        .route(
            "/admin/password-requests/{id}/review",
            post(review_password_request),
        )
}

// ── Users ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_user_type")]
    pub user_type: UserType,
    #[serde(default = "default_role")]
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_searches_per_day: Option<i32>,
    pub max_exports_per_day: Option<i32>,
}

fn default_user_type() -> UserType {
    UserType::Permanent
}

fn default_role() -> Role {
    Role::User
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(body): Json<CreateUserBody>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let name = body.name.trim().to_string();
    let email = body.email.trim().to_lowercase();
    if name.is_empty() || !email.contains('@') {
        return Err(ApiError::InvalidRequest(
            "name and a valid email are required".into(),
        ));
    }
    if body.password.len() < 8 {
        return Err(ApiError::InvalidRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if body.user_type == UserType::Demo && body.expires_at.is_none() {
        return Err(ApiError::InvalidRequest(
            "DEMO users require expires_at".into(),
        ));
    }

    let password_hash = hash_password(body.password).await?;
    let user = state
        .db
        .create_user(&NewUser {
            name,
            email,
            password_hash,
            user_type: body.user_type,
            role: body.role,
            expires_at: body.expires_at,
            max_searches_per_day: body
                .max_searches_per_day
                .unwrap_or(state.config.limits.max_searches_per_day),
            max_exports_per_day: body
                .max_exports_per_day
                .unwrap_or(state.config.limits.max_exports_per_day),
        })
        .await?;
    tracing::info!(user_id = %user.id, admin = %admin.0.user.id, "User created");
    Ok((StatusCode::CREATED, Json(user.profile())))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = state.db.list_users().await?;
    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    Ok(Json(user.profile()))
}

/// `expires_at` distinguishes absent (leave unchanged) from `null` (clear)
/// via the double-Option pattern.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserBody {
    pub name: Option<String>,
    pub user_type: Option<UserType>,
    #[serde(deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub max_searches_per_day: Option<i32>,
    pub max_exports_per_day: Option<i32>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserBody>,
) -> ApiResult<Json<UserProfile>> {
    let update = UserUpdate {
        name: body.name,
        user_type: body.user_type,
        expires_at: body.expires_at,
        is_active: body.is_active,
        max_searches_per_day: body.max_searches_per_day,
        max_exports_per_day: body.max_exports_per_day,
    };
    // Deactivation leaves sessions in place on purpose: validation rejects
    // them through the user-active check, and reactivation restores access.
    let user = state
        .db
        .update_user(id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    tracing::info!(user_id = %id, admin = %admin.0.user.id, "User updated");
    Ok(Json(user.profile()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
    if user.role == Role::Admin {
        return Err(ApiError::Forbidden("admin users cannot be deleted".into()));
    }
    if !state.db.delete_user(id).await? {
        // Role changed between the read and the delete.
        return Err(ApiError::Forbidden("admin users cannot be deleted".into()));
    }
    tracing::info!(user_id = %id, admin = %admin.0.user.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordBody {
    pub password: String,
}

async fn set_password(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SetPasswordBody>,
) -> ApiResult<StatusCode> {
    if body.password.len() < 8 {
        return Err(ApiError::InvalidRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    let password_hash = hash_password(body.password).await?;
    if !state.db.set_password(id, &password_hash).await? {
        return Err(ApiError::NotFound(format!("user {id}")));
    }
    tracing::info!(user_id = %id, admin = %admin.0.user.id, "Password set");
    Ok(StatusCode::NO_CONTENT)
}

// ── Sessions ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SessionFilter {
    pub user_id: Option<Uuid>,
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state
        .db
        .list_active_sessions(filter.user_id, Utc::now())
        .await?;
    // Summaries only; the token hash never leaves the db layer.
    Ok(Json(sessions.iter().map(|s| s.summary()).collect()))
}

#[derive(Debug, Serialize)]
struct InvalidatedResponse {
    invalidated: u64,
}

async fn kill_user_sessions(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvalidatedResponse>> {
    let invalidated = state.db.invalidate_sessions_for_user(id, Utc::now()).await?;
    tracing::info!(user_id = %id, admin = %admin.0.user.id, invalidated, "Sessions invalidated");
    Ok(Json(InvalidatedResponse { invalidated }))
}

#[derive(Debug, Serialize)]
struct CleanupResponse {
    purged: u64,
}

async fn cleanup_sessions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Json<CleanupResponse>> {
    let cutoff = Utc::now() - Duration::days(7);
    let purged = state.db.purge_stale_sessions(cutoff).await?;
    Ok(Json(CleanupResponse { purged }))
}

// ── Quota reset ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetBody {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    date: chrono::NaiveDate,
    rows: u64,
}

async fn reset_daily_counts(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    body: Option<Json<ResetBody>>,
) -> ApiResult<Json<ResetResponse>> {
    let date = state.today();
    let user_id = body.and_then(|Json(b)| b.user_id);
    let rows = match user_id {
        Some(user_id) => {
            state.db.reset_search_count(user_id, date).await?;
            1
        }
        None => state.db.reset_all_usage(date).await?,
    };
    tracing::info!(admin = %admin.0.user.id, %date, rows, "Manual daily reset");
    Ok(Json(ResetResponse { date, rows }))
}

// ── CSV import ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImportPathBody {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub has_header: bool,
    pub batch_size: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct ImportStartedResponse {
    job_id: Uuid,
    status: &'static str,
}

/// Kick the ingest off in the background; a 100M-row file cannot finish
/// inside a request deadline. The final report lands in `system_logs`.
fn spawn_ingest(state: Arc<AppState>, options: CsvIngestOptions) -> Uuid {
    let job_id = options.job_id;
    tokio::spawn(async move {
        let analytics = state.analytics.clone();
        let outcome = ingest_csv(&analytics, &options, |_| {}).await;
        let (level, message, context) = match &outcome {
            Ok(report) => (
                "info",
                "csv ingest finished",
                serde_json::to_value(report).unwrap_or_default(),
            ),
            Err(e) => ("error", "csv ingest failed", json!({ "error": e.to_string() })),
        };
        if let Err(e) = state
            .db
            .insert_system_log(level, "ingest", message, Some(context))
            .await
        {
            tracing::warn!(error = %e, %job_id, "Failed to record ingest outcome");
        }
    });
    job_id
}

async fn import_csv_path(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(body): Json<ImportPathBody>,
) -> ApiResult<(StatusCode, Json<ImportStartedResponse>)> {
    if !body.path.is_file() {
        return Err(ApiError::InvalidRequest(format!(
            "no such file: {}",
            body.path.display()
        )));
    }
    let mut options = CsvIngestOptions::new(body.path);
    options.has_header = body.has_header;
    if let Some(batch_size) = body.batch_size {
        options.batch_size = batch_size;
    } else {
        options.batch_size = state.config.csv.batch_size;
    }
    options.positions = FieldPositions::default();

    let job_id = spawn_ingest(state, options);
    tracing::info!(%job_id, admin = %admin.0.user.id, "CSV path ingest started");
    Ok((
        StatusCode::ACCEPTED,
        Json(ImportStartedResponse {
            job_id,
            status: "started",
        }),
    ))
}

/// Multipart upload variant: the file part is spooled to `csv.temp_dir`,
/// then ingested exactly like a server-local path.
async fn import_csv_upload(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImportStartedResponse>)> {
    let temp_dir = PathBuf::from(&state.config.csv.temp_dir);
    std::fs::create_dir_all(&temp_dir)
        .map_err(|e| ApiError::IngestionError(format!("temp dir: {e}")))?;

    let mut spooled: Option<PathBuf> = None;
    let mut has_header = true;
    let mut batch_size = state.config.csv.batch_size;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let path = temp_dir.join(format!("upload-{}.csv", Uuid::new_v4()));
                let mut file = std::fs::File::create(&path)
                    .map_err(|e| ApiError::IngestionError(format!("spool file: {e}")))?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::IngestionError(format!("upload read: {e}")))?
                {
                    file.write_all(&chunk)
                        .map_err(|e| ApiError::IngestionError(format!("spool write: {e}")))?;
                }
                spooled = Some(path);
            }
            Some("has_header") => {
                let text = field.text().await.unwrap_or_default();
                has_header = text.trim() != "false";
            }
            Some("batch_size") => {
                if let Ok(parsed) = field.text().await.unwrap_or_default().trim().parse() {
                    batch_size = parsed;
                }
            }
            _ => {}
        }
    }

    let path = spooled
        .ok_or_else(|| ApiError::InvalidRequest("multipart field 'file' is required".into()))?;
    let mut options = CsvIngestOptions::new(path);
    options.has_header = has_header;
    options.batch_size = batch_size;

    let job_id = spawn_ingest(state, options);
    tracing::info!(%job_id, admin = %admin.0.user.id, "CSV upload ingest started");
    Ok((
        StatusCode::ACCEPTED,
        Json(ImportStartedResponse {
            job_id,
            status: "started",
        }),
    ))
}

// ── Moderation ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<RequestStatus>,
}

async fn list_registrations(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<RegistrationRequest>>> {
    Ok(Json(
        state.db.list_registration_requests(filter.status).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub decision: Decision,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for ReviewDecision {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approve => ReviewDecision::Approve,
            Decision::Reject => ReviewDecision::Reject,
        }
    }
}

/// Approval marks the request for manual user creation; it does not create
/// the account.
async fn review_registration(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> ApiResult<Json<RegistrationRequest>> {
    let request = state
        .db
        .review_registration_request(
            id,
            body.decision.into(),
            body.admin_notes.as_deref(),
            admin.0.user.id,
        )
        .await?
        .ok_or_else(|| {
            ApiError::InvalidRequest("request not found or already reviewed".into())
        })?;
    tracing::info!(request_id = %id, admin = %admin.0.user.id, status = ?request.status, "Registration reviewed");
    Ok(Json(request))
}

async fn list_password_requests(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<PasswordChangeRequest>>> {
    Ok(Json(
        state.db.list_password_change_requests(filter.status).await?,
    ))
}

async fn review_password_request(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> ApiResult<Json<PasswordChangeRequest>> {
    let request = state
        .db
        .review_password_change_request(
            id,
            body.decision.into(),
            body.admin_notes.as_deref(),
            admin.0.user.id,
        )
        .await?
        .ok_or_else(|| {
            ApiError::InvalidRequest("request not found or already reviewed".into())
        })?;
    tracing::info!(request_id = %id, admin = %admin.0.user.id, status = ?request.status, "Password request reviewed");
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_distinguishes_absent_from_null_expiry() {
        let absent: UpdateUserBody = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.expires_at, None);

        let cleared: UpdateUserBody = serde_json::from_str(r#"{"expires_at":null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));

        let set: UpdateUserBody =
            serde_json::from_str(r#"{"expires_at":"2026-12-31T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.expires_at, Some(Some(_))));
    }

    #[test]
    fn review_decision_wire_format() {
        let body: ReviewBody = serde_json::from_str(r#"{"decision":"approve"}"#).unwrap();
        assert!(matches!(body.decision, Decision::Approve));
        let body: ReviewBody =
            serde_json::from_str(r#"{"decision":"reject","admin_notes":"no"}"#).unwrap();
        assert!(matches!(body.decision, Decision::Reject));
    }
}
