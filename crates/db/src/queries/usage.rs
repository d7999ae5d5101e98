// crates/db/src/queries/usage.rs
// Daily quota counters. The reserve path must stay race-free under
// concurrent searches by the same user, so the conditional increment is a
// single UPDATE; no read-modify-write in process.

use crate::{Database, DbResult};
use chrono::NaiveDate;
use finone_core::DailyUsage;
use uuid::Uuid;

/// Which counter a reservation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Search,
    Export,
}

impl UsageKind {
    fn column(&self) -> &'static str {
        match self {
            UsageKind::Search => "search_count",
            UsageKind::Export => "export_count",
        }
    }
}

impl Database {
    /// Atomically reserve one unit against the day's counter. Returns the
    /// post-increment count on success, `None` when the quota is exhausted
    /// (including `max == 0`).
    pub async fn reserve_usage(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        kind: UsageKind,
        max_per_day: i32,
    ) -> DbResult<Option<i32>> {
        // Ensure the row exists so the conditional UPDATE below always has a
        // target. Losing this insert race is fine: DO NOTHING.
        sqlx::query(
            r#"
            INSERT INTO daily_usage (user_id, date, search_count, export_count)
            VALUES ($1, $2, 0, 0)
            ON CONFLICT (user_id, date) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(date)
        .execute(self.pool())
        .await?;

        let column = kind.column();
        let reserved: Option<(i32,)> = sqlx::query_as(&format!(
            r#"
            UPDATE daily_usage
            SET {column} = {column} + 1
            WHERE user_id = $1 AND date = $2 AND {column} < $3
            RETURNING {column}
            "#
        ))
        .bind(user_id)
        .bind(date)
        .bind(max_per_day)
        .fetch_optional(self.pool())
        .await?;
        Ok(reserved.map(|(count,)| count))
    }

    /// Hand back a reservation after a downstream failure or cancellation,
    /// so the attempt does not consume quota.
    pub async fn release_usage(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        kind: UsageKind,
    ) -> DbResult<()> {
        let column = kind.column();
        sqlx::query(&format!(
            r#"
            UPDATE daily_usage
            SET {column} = GREATEST({column} - 1, 0)
            WHERE user_id = $1 AND date = $2
            "#
        ))
        .bind(user_id)
        .bind(date)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_usage(&self, user_id: Uuid, date: NaiveDate) -> DbResult<DailyUsage> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT search_count, export_count FROM daily_usage WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(self.pool())
        .await?;
        let (search_count, export_count) = row.unwrap_or((0, 0));
        Ok(DailyUsage {
            user_id,
            date,
            search_count,
            export_count,
        })
    }

    /// Zero one user's search counter for the given day.
    pub async fn reset_search_count(&self, user_id: Uuid, date: NaiveDate) -> DbResult<()> {
        sqlx::query("UPDATE daily_usage SET search_count = 0 WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Scheduler entry point: zero both counters for every user for the
    /// given (reset-zone) day. Returns affected rows.
    pub async fn reset_all_usage(&self, date: NaiveDate) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE daily_usage SET search_count = 0, export_count = 0 WHERE date = $1",
        )
        .bind(date)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
