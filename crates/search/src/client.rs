// crates/search/src/client.rs
//! Analytic store connection.

use crate::schema;
use crate::SearchResult;
use clickhouse::{Client, Compression};
use finone_core::config::ClickhouseConfig;
use tracing::info;

/// Handle on the ClickHouse HTTP endpoint. Cheap to clone; the underlying
/// client pools connections internally.
#[derive(Clone)]
pub struct Analytics {
    client: Client,
    database: String,
}

impl Analytics {
    /// Build the client. Does not touch the network until the first query.
    pub fn connect(config: &ClickhouseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password)
            .with_compression(Compression::Lz4);
        Self {
            client,
            database: config.database.clone(),
        }
    }

    /// Apply the idempotent DDL set. Run at startup; failure is fatal.
    pub async fn ensure_schema(&self) -> SearchResult<()> {
        for statement in schema::ddl(&self.database) {
            self.client.query(&statement).execute().await?;
        }
        info!(database = %self.database, "Analytic store schema ready");
        Ok(())
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> SearchResult<()> {
        self.client.query("SELECT 1").fetch_one::<u8>().await?;
        Ok(())
    }

    pub(crate) fn inner(&self) -> &Client {
        &self.client
    }
}
