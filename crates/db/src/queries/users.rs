// crates/db/src/queries/users.rs
// User account CRUD. Password hashes stay inside this layer and the auth
// module; nothing here logs or serializes them.

use super::row_types::UserRow;
use crate::{Database, DbResult};
use chrono::{DateTime, Utc};
use finone_core::{Role, User, UserType};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, user_type, role, expires_at, \
     is_active, max_searches_per_day, max_exports_per_day, created_at, updated_at";

/// Input for user creation (admin-initiated or post-approval manual step).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_searches_per_day: i32,
    pub max_exports_per_day: i32,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub user_type: Option<UserType>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub max_searches_per_day: Option<i32>,
    pub max_exports_per_day: Option<i32>,
}

impl Database {
    pub async fn create_user(&self, new: &NewUser) -> DbResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, user_type, role,
                expires_at, max_searches_per_day, max_exports_per_day,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.user_type.as_db_str())
        .bind(new.role.as_db_str())
        .bind(new.expires_at)
        .bind(new.max_searches_per_day)
        .bind(new.max_exports_per_day)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into_user())
    }

    pub async fn get_user(&self, id: Uuid) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(UserRow::into_user))
    }

    pub async fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(UserRow::into_user))
    }

    pub async fn list_users(&self) -> DbResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    /// Apply a partial update. Returns the updated user, or `None` when the
    /// id does not exist.
    pub async fn update_user(&self, id: Uuid, update: &UserUpdate) -> DbResult<Option<User>> {
        // expires_at uses a present/value pair so the caller can distinguish
        // "leave unchanged" from "clear".
        let (set_expiry, expires_at) = match &update.expires_at {
            Some(value) => (true, *value),
            None => (false, None),
        };
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                user_type = COALESCE($3, user_type),
                expires_at = CASE WHEN $4 THEN $5 ELSE expires_at END,
                is_active = COALESCE($6, is_active),
                max_searches_per_day = COALESCE($7, max_searches_per_day),
                max_exports_per_day = COALESCE($8, max_exports_per_day),
                updated_at = $9
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(update.user_type.map(|t| t.as_db_str()))
        .bind(set_expiry)
        .bind(expires_at)
        .bind(update.is_active)
        .bind(update.max_searches_per_day)
        .bind(update.max_exports_per_day)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    /// Delete a non-admin user. The role guard lives in the handler, which
    /// loads the user first; this query re-checks it so a concurrent role
    /// change cannot slip an admin through.
    pub async fn delete_user(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND role <> 'ADMIN'")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
