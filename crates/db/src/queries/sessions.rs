// crates/db/src/queries/sessions.rs
// Server-side session rows. Token hashes go in, session summaries come out;
// the hash itself is never surfaced past this module's callers.

use super::row_types::SessionRow;
use crate::{Database, DbResult};
use chrono::{DateTime, Utc};
use finone_core::SessionRecord;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, user_id, session_token_hash, created_at, expires_at, \
     is_active, ip_address, user_agent, logged_out_at";

impl Database {
    pub async fn insert_session(&self, session: &SessionRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (
                id, user_id, session_token_hash, created_at, expires_at,
                is_active, ip_address, user_agent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// The validation lookup: active, not logged out, not expired.
    pub async fn find_live_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SessionRecord>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM user_sessions
            WHERE session_token_hash = $1
              AND is_active
              AND logged_out_at IS NULL
              AND expires_at > $2
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(SessionRow::into_record))
    }

    /// Mark the session carrying this token as logged out. Idempotent: a
    /// second call matches no active row and affects nothing.
    pub async fn logout_session(&self, token_hash: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE, logged_out_at = $2
            WHERE session_token_hash = $1 AND is_active
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Kill every active session for one user (admin action, or deactivation
    /// follow-up). Returns how many were invalidated.
    pub async fn invalidate_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE, logged_out_at = $2
            WHERE user_id = $1 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Admin listing of live sessions, optionally scoped to one user.
    pub async fn list_active_sessions(
        &self,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<SessionRecord>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM user_sessions
            WHERE is_active
              AND logged_out_at IS NULL
              AND expires_at > $1
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(now)
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(SessionRow::into_record).collect())
    }

    /// Weekly cleanup: drop rows expired or logged out before the cutoff.
    pub async fn purge_stale_sessions(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM user_sessions WHERE expires_at < $1 OR logged_out_at < $1",
        )
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn record_login(
        &self,
        user_id: Uuid,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO logins (id, user_id, ip_address, user_agent, logged_in_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
