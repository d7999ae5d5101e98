// crates/core/src/types.rs
//! Domain types shared by the operational store, the analytic store, and the
//! HTTP layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account class. DEMO accounts carry an `expires_at` after which login and
/// session validation fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Demo,
    Permanent,
}

impl UserType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            UserType::Demo => "DEMO",
            UserType::Permanent => "PERMANENT",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "DEMO" => UserType::Demo,
            _ => UserType::Permanent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// A service account. `password_hash` never leaves the db layer — the HTTP
/// layer serializes users through [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_searches_per_day: i32,
    pub max_exports_per_day: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// DEMO accounts stop working once their expiry passes.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.user_type == UserType::Demo
            && self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            user_type: self.user_type,
            role: self.role,
            expires_at: self.expires_at,
            is_active: self.is_active,
            max_searches_per_day: self.max_searches_per_day,
            max_exports_per_day: self.max_exports_per_day,
            created_at: self.created_at,
        }
    }
}

/// The wire-safe projection of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_searches_per_day: i32,
    pub max_exports_per_day: i32,
    pub created_at: DateTime<Utc>,
}

/// A server-side session row. `token_hash` is the hex SHA-256 of the issued
/// bearer token and must never be serialized or logged.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub logged_out_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Admin-facing projection. Deliberately omits the token hash.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            logged_out_at: self.logged_out_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub logged_out_at: Option<DateTime<Utc>>,
}

/// Per-user per-day counters. `date` is computed in the configured reset
/// time zone, not UTC.
#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub search_count: i32,
    pub export_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "APPROVED" => RequestStatus::Approved,
            "REJECTED" => RequestStatus::Rejected,
            _ => RequestStatus::Pending,
        }
    }

    /// PENDING is the only non-terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A self-service signup awaiting admin review. Approval does not create a
/// user account; it only marks the request for manual follow-up.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub requested_searches: i32,
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChangeRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub reason: String,
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}
