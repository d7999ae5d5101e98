// crates/db/src/lib.rs
//! Operational store client: PostgreSQL pool, inline migrations, and typed
//! query modules for users, sessions, daily usage, search logs, and
//! moderation requests.

mod migrations;
mod queries;

pub use queries::requests::{NewRegistrationRequest, ReviewDecision};
pub use queries::search_logs::{
    SearchLogEntry, SearchLogStats, StoredSearch, SEARCH_RETENTION_HOURS, SEARCH_STATUS_FAILED,
    SEARCH_STATUS_OK,
};
pub use queries::usage::UsageKind;
pub use queries::users::{NewUser, UserUpdate};

use finone_core::config::PostgresConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Pool exhaustion is surfaced to clients as ServiceBusy rather than a
    /// generic upstream failure.
    pub fn is_pool_timeout(&self) -> bool {
        matches!(self, DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    /// Unique-constraint violations (duplicate email, duplicate pending
    /// request) map to 400s, not 500s.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(e)) => {
                e.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Main handle wrapping the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect, bound the pool, and run migrations. A migration failure is
    /// returned to the caller, which treats it as startup-fatal.
    pub async fn connect(config: &PostgresConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        info!(max_connections = config.max_connections, "Operational store ready");
        Ok(db)
    }

    /// Build the pool without touching the network and without migrating.
    /// Used by tests that only need a constructible handle.
    pub fn connect_lazy(config: &PostgresConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all inline migrations.
    ///
    /// A `_migrations` table tracks the highest applied version so each
    /// statement executes exactly once, in order.
    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version BIGINT PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let (current_version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
                .fetch_one(&self.pool)
                .await?;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i64;
            if version <= current_version {
                continue;
            }
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO _migrations (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(version, "Applied migration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lazy_pool_does_not_connect() {
        let config = PostgresConfig::default();
        // Must succeed without a server listening.
        let _db = Database::connect_lazy(&config).expect("lazy pool");
    }

    #[test]
    fn pool_timeout_is_service_busy() {
        let err = DbError::Sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_pool_timeout());
        let err = DbError::Sqlx(sqlx::Error::RowNotFound);
        assert!(!err.is_pool_timeout());
    }
}
