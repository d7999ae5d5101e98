// crates/db/src/queries/row_types.rs
// Internal row types mapping Postgres rows onto the shared domain types.
// Enum-ish columns come back as TEXT and convert via from_db_str.

use chrono::{DateTime, Utc};
use finone_core::{
    PasswordChangeRequest, RegistrationRequest, RequestStatus, Role, SessionRecord, User,
    UserType,
};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug)]
pub(crate) struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    user_type: String,
    role: String,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    max_searches_per_day: i32,
    max_exports_per_day: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            user_type: row.try_get("user_type")?,
            role: row.try_get("role")?,
            expires_at: row.try_get("expires_at")?,
            is_active: row.try_get("is_active")?,
            max_searches_per_day: row.try_get("max_searches_per_day")?,
            max_exports_per_day: row.try_get("max_exports_per_day")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl UserRow {
    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            user_type: UserType::from_db_str(&self.user_type),
            role: Role::from_db_str(&self.role),
            expires_at: self.expires_at,
            is_active: self.is_active,
            max_searches_per_day: self.max_searches_per_day,
            max_exports_per_day: self.max_exports_per_day,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    session_token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    logged_out_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            session_token_hash: row.try_get("session_token_hash")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            is_active: row.try_get("is_active")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            logged_out_at: row.try_get("logged_out_at")?,
        })
    }
}

impl SessionRow {
    pub(crate) fn into_record(self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            user_id: self.user_id,
            token_hash: self.session_token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            logged_out_at: self.logged_out_at,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RegistrationRequestRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    requested_searches: i32,
    status: String,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RegistrationRequestRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            requested_searches: row.try_get("requested_searches")?,
            status: row.try_get("status")?,
            admin_notes: row.try_get("admin_notes")?,
            created_at: row.try_get("created_at")?,
            reviewed_at: row.try_get("reviewed_at")?,
            reviewed_by: row.try_get("reviewed_by")?,
        })
    }
}

impl RegistrationRequestRow {
    pub(crate) fn into_request(self) -> RegistrationRequest {
        RegistrationRequest {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            requested_searches: self.requested_searches,
            status: RequestStatus::from_db_str(&self.status),
            admin_notes: self.admin_notes,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PasswordChangeRequestRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_email: String,
    reason: String,
    status: String,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PasswordChangeRequestRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            user_name: row.try_get("user_name")?,
            user_email: row.try_get("user_email")?,
            reason: row.try_get("reason")?,
            status: row.try_get("status")?,
            admin_notes: row.try_get("admin_notes")?,
            created_at: row.try_get("created_at")?,
            reviewed_at: row.try_get("reviewed_at")?,
            reviewed_by: row.try_get("reviewed_by")?,
        })
    }
}

impl PasswordChangeRequestRow {
    pub(crate) fn into_request(self) -> PasswordChangeRequest {
        PasswordChangeRequest {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            user_email: self.user_email,
            reason: self.reason,
            status: RequestStatus::from_db_str(&self.status),
            admin_notes: self.admin_notes,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by,
        }
    }
}
