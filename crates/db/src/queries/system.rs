// crates/db/src/queries/system.rs
// Service-side event log: scheduler runs and ingest jobs leave a row here
// so operators can audit background activity without scraping stdout.

use crate::{Database, DbResult};
use chrono::Utc;

impl Database {
    pub async fn insert_system_log(
        &self,
        level: &str,
        component: &str,
        message: &str,
        context: Option<serde_json::Value>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO system_logs (level, component, message, context, logged_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(level)
        .bind(component)
        .bind(message)
        .bind(context)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
