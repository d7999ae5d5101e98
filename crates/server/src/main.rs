// crates/server/src/main.rs
//! finone server binary.
//!
//! Startup order: config → operational store (migrations) → analytic store
//! (schema bootstrap) → scheduler → HTTP. Any failure before the listener
//! binds exits non-zero. Teardown runs in reverse: the listener drains
//! in-flight requests, then the scheduler is stopped.

use anyhow::Context;
use clap::Parser;
use finone_core::config::AppConfig;
use finone_db::Database;
use finone_search::Analytics;
use finone_server::{create_app, AppState, Scheduler};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "finone", about = "Multi-tenant people-search service")]
struct Args {
    /// Path to the YAML config file; FINONE_* env vars override its values.
    #[arg(long, default_value = "finone.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let tz = config.reset_timezone().expect("config validated");
    let reset_time = config.daily_reset_time().expect("config validated");

    let db = Database::connect(&config.database.postgres)
        .await
        .context("connecting to the operational store")?;

    let analytics = Analytics::connect(&config.database.clickhouse);
    analytics
        .ensure_schema()
        .await
        .context("preparing the analytic store schema")?;

    let scheduler = Scheduler::new(db.clone(), tz, reset_time);
    tracing::info!(next_reset = %scheduler.next_reset(), %tz, "Scheduler starting");
    let scheduler_handle = scheduler.spawn();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, db, analytics);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "finone listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP listener drained; stopping scheduler");
    scheduler_handle.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Shutdown signal received");
}
