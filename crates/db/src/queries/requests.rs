// crates/db/src/queries/requests.rs
// Registration and password-change moderation queues. Reviews are enforced
// terminal at the SQL level: only PENDING rows can transition, so a second
// review of the same request matches nothing.

use super::row_types::{PasswordChangeRequestRow, RegistrationRequestRow};
use crate::{Database, DbResult};
use chrono::Utc;
use finone_core::{PasswordChangeRequest, RegistrationRequest, RequestStatus};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewRegistrationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub requested_searches: i32,
}

/// Admin verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn status(&self) -> RequestStatus {
        match self {
            ReviewDecision::Approve => RequestStatus::Approved,
            ReviewDecision::Reject => RequestStatus::Rejected,
        }
    }
}

const REGISTRATION_COLUMNS: &str = "id, name, email, phone, requested_searches, status, \
     admin_notes, created_at, reviewed_at, reviewed_by";

const PASSWORD_CHANGE_COLUMNS: &str = "id, user_id, user_name, user_email, reason, status, \
     admin_notes, created_at, reviewed_at, reviewed_by";

impl Database {
    pub async fn create_registration_request(
        &self,
        new: &NewRegistrationRequest,
    ) -> DbResult<RegistrationRequest> {
        let row: RegistrationRequestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO user_registration_requests
                (id, name, email, phone, requested_searches, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.requested_searches)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into_request())
    }

    pub async fn list_registration_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> DbResult<Vec<RegistrationRequest>> {
        let rows: Vec<RegistrationRequestRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS} FROM user_registration_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(status.map(|s| s.as_db_str()))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(RegistrationRequestRow::into_request).collect())
    }

    /// PENDING → APPROVED|REJECTED. Returns `None` when the request is
    /// unknown or already reviewed. Approval does not create a user.
    pub async fn review_registration_request(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        admin_notes: Option<&str>,
        reviewed_by: Uuid,
    ) -> DbResult<Option<RegistrationRequest>> {
        let row: Option<RegistrationRequestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE user_registration_requests
            SET status = $2, admin_notes = $3, reviewed_at = $4, reviewed_by = $5
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(decision.status().as_db_str())
        .bind(admin_notes)
        .bind(Utc::now())
        .bind(reviewed_by)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(RegistrationRequestRow::into_request))
    }

    pub async fn create_password_change_request(
        &self,
        user_id: Uuid,
        user_name: &str,
        user_email: &str,
        reason: &str,
    ) -> DbResult<PasswordChangeRequest> {
        let row: PasswordChangeRequestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO user_password_change_requests
                (id, user_id, user_name, user_email, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PASSWORD_CHANGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(user_name)
        .bind(user_email)
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into_request())
    }

    pub async fn list_password_change_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> DbResult<Vec<PasswordChangeRequest>> {
        let rows: Vec<PasswordChangeRequestRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PASSWORD_CHANGE_COLUMNS} FROM user_password_change_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(status.map(|s| s.as_db_str()))
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(PasswordChangeRequestRow::into_request)
            .collect())
    }

    pub async fn review_password_change_request(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        admin_notes: Option<&str>,
        reviewed_by: Uuid,
    ) -> DbResult<Option<PasswordChangeRequest>> {
        let row: Option<PasswordChangeRequestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE user_password_change_requests
            SET status = $2, admin_notes = $3, reviewed_at = $4, reviewed_by = $5
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {PASSWORD_CHANGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(decision.status().as_db_str())
        .bind(admin_notes)
        .bind(Utc::now())
        .bind(reviewed_by)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(PasswordChangeRequestRow::into_request))
    }
}
