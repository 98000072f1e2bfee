use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common_observability::ControlPlaneMetrics;
use control_plane::config::AppConfig;
use control_plane::jobs::{run_forever, WorkerContext};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;

const BATCH_SIZE: i64 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = AppConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let ctx = WorkerContext {
        pool,
        metrics: Arc::new(ControlPlaneMetrics::new()),
        batch_size: BATCH_SIZE,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!(poll_ms = config.worker_poll_ms, "worker starting");
    run_forever(ctx, Duration::from_millis(config.worker_poll_ms), shutdown_rx).await;
    Ok(())
}
