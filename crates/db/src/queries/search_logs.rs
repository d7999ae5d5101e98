// crates/db/src/queries/search_logs.rs
// Search audit rows. Each attempt that passed quota reserve gets one row,
// holding the canonical structured query (JSONB) so search-within can
// rebuild the predicate without ever storing raw SQL.

use crate::{Database, DbResult};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Marker values for `searches.status`.
pub const SEARCH_STATUS_OK: &str = "ok";
pub const SEARCH_STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone)]
pub struct SearchLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query: serde_json::Value,
    pub fingerprint: String,
    pub result_count: i64,
    pub execution_time_ms: i64,
    pub status: &'static str,
}

/// A prior search reloaded for search-within.
#[derive(Debug, Clone)]
pub struct StoredSearch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query: serde_json::Value,
    pub fingerprint: String,
    pub search_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLogStats {
    pub avg_execution_ms: f64,
    pub searches_last_24h: i64,
}

/// How long a `search_id` stays usable for search-within.
pub const SEARCH_RETENTION_HOURS: i64 = 24;

impl Database {
    pub async fn insert_search_log(&self, entry: &SearchLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO searches (
                id, user_id, search_query, fingerprint, search_time,
                result_count, execution_time_ms, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(&entry.query)
        .bind(&entry.fingerprint)
        .bind(Utc::now())
        .bind(entry.result_count)
        .bind(entry.execution_time_ms)
        .bind(entry.status)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Load a prior successful search for refinement. Returns `None` for an
    /// unknown id, another user's id, or a row past the retention window —
    /// all of which the caller reports as ExpiredSearchId.
    pub async fn get_search_for_within(
        &self,
        search_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<StoredSearch>> {
        let cutoff = now - Duration::hours(SEARCH_RETENTION_HOURS);
        let row: Option<(Uuid, Uuid, serde_json::Value, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, user_id, search_query, fingerprint, search_time
            FROM searches
            WHERE id = $1 AND user_id = $2 AND status = 'ok' AND search_time > $3
            "#,
        )
        .bind(search_id)
        .bind(user_id)
        .bind(cutoff)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(id, user_id, query, fingerprint, search_time)| StoredSearch {
            id,
            user_id,
            query,
            fingerprint,
            search_time,
        }))
    }

    /// Aggregates backing GetStats.
    pub async fn search_log_stats(&self, now: DateTime<Utc>) -> DbResult<SearchLogStats> {
        let since = now - Duration::hours(24);
        let (avg_execution_ms, searches_last_24h): (f64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(AVG(execution_time_ms), 0)::float8,
                COUNT(*) FILTER (WHERE search_time > $1)
            FROM searches
            WHERE status = 'ok'
            "#,
        )
        .bind(since)
        .fetch_one(self.pool())
        .await?;
        Ok(SearchLogStats {
            avg_execution_ms,
            searches_last_24h,
        })
    }

    pub async fn record_export(
        &self,
        user_id: Uuid,
        search_id: Option<Uuid>,
        row_count: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO exports (id, user_id, search_id, row_count, exported_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(search_id)
        .bind(row_count)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
