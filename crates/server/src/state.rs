// crates/server/src/state.rs
//! Application state for the Axum server.

use crate::auth::AuthService;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use finone_core::config::AppConfig;
use finone_db::Database;
use finone_search::{Analytics, SearchExecutor};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime reporting.
    pub start_time: Instant,
    pub config: AppConfig,
    /// Operational store (users, sessions, quotas, audit).
    pub db: Database,
    /// Analytic store handle (schema bootstrap, health).
    pub analytics: Analytics,
    /// Query executor over the people table.
    pub executor: SearchExecutor,
    pub auth: AuthService,
    /// Zone the daily counters roll over in.
    pub reset_tz: Tz,
}

impl AppState {
    /// Assemble the state. `config` must already be validated, so the
    /// timezone parse cannot fail here.
    pub fn new(config: AppConfig, db: Database, analytics: Analytics) -> Arc<Self> {
        let reset_tz = config
            .reset_timezone()
            .expect("config validated at startup");
        let executor = SearchExecutor::new(analytics.clone());
        Arc::new(Self {
            start_time: Instant::now(),
            auth: AuthService::new(&config.jwt),
            config,
            db,
            analytics,
            executor,
            reset_tz,
        })
    }

    /// Today's date in the reset zone — the key every quota row uses.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.reset_tz).date_naive()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
