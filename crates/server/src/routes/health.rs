// crates/server/src/routes/health.rs
//! Liveness endpoint: uptime plus reachability of both stores.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub postgres: bool,
    pub clickhouse: bool,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let postgres = state.db.ping().await.is_ok();
    let clickhouse = state.analytics.ping().await.is_ok();
    let status = if postgres && clickhouse {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        uptime_secs: state.uptime_secs(),
        postgres,
        clickhouse,
    })
}
