use std::sync::Arc;
use std::time::{Duration, Instant};

use common_observability::ControlPlaneMetrics;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::jobs::{self, Job, JobType};

#[derive(Clone)]
pub struct WorkerContext {
    pub pool: PgPool,
    pub metrics: Arc<ControlPlaneMetrics>,
    pub batch_size: i64,
}

/// Runs the poll loop until the process is asked to shut down. Mirrors the
/// background-refresh idiom used elsewhere in this workspace: a fixed
/// interval, logged iterations, and a cooperative shutdown signal rather
/// than an abrupt task abort.
pub async fn run_forever(ctx: WorkerContext, poll_interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = run_once(&ctx).await {
                    error!(error = %err, "job_poll_failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("worker_shutdown");
                    return;
                }
            }
        }
    }
}

pub async fn run_once(ctx: &WorkerContext) -> sqlx::Result<()> {
    let batch = jobs::fetch_pending_batch(&ctx.pool, ctx.batch_size).await?;
    for job in batch {
        process_job(ctx, job).await;
    }
    Ok(())
}

async fn process_job(ctx: &WorkerContext, job: Job) {
    let Some(job_type) = JobType::parse(&job.job_type) else {
        warn!(job_id = %job.id, job_type = %job.job_type, "unknown_job_type");
        let _ = jobs::fail(&ctx.pool, job.id, job.retries, "unknown job type").await;
        return;
    };

    let started = Instant::now();
    let outcome = match job_type {
        JobType::ScanAttachment => scan_attachment(&ctx.pool, &job).await,
        JobType::SendNotification => send_notification(&job).await,
        JobType::IncidentSummary => incident_summary(&ctx.pool, &job).await,
    };
    ctx.metrics.job_duration_seconds.observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => {
            if let Err(err) = jobs::complete(&ctx.pool, job.id, result).await {
                error!(job_id = %job.id, error = %err, "job_complete_write_failed");
            }
            ctx.metrics
                .job_runs_total
                .with_label_values(&[job_type.as_str(), "completed"])
                .inc();
        }
        Err(err) => {
            warn!(job_id = %job.id, job_type = job_type.as_str(), error = %err, "job_failed");
            if let Err(write_err) = jobs::fail(&ctx.pool, job.id, job.retries, &err).await {
                error!(job_id = %job.id, error = %write_err, "job_fail_write_failed");
            }
            ctx.metrics
                .job_runs_total
                .with_label_values(&[job_type.as_str(), "failed"])
                .inc();
        }
    }
}

/// Marks the attachment CLEAN. Idempotent: re-running against an already
/// scanned attachment just re-asserts the same terminal status.
async fn scan_attachment(pool: &PgPool, job: &Job) -> Result<serde_json::Value, String> {
    let attachment_id = job
        .payload
        .get("attachment_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| "missing attachment_id in payload".to_string())?;

    sqlx::query("UPDATE attachments SET scan_status = 'CLEAN' WHERE id = $1")
        .bind(attachment_id)
        .execute(pool)
        .await
        .map_err(|e| e.to_string())?;

    Ok(serde_json::json!({"attachment_id": attachment_id, "scan_status": "CLEAN"}))
}

/// Stands in for an outbound notification dispatch (email/Slack/etc). This
/// workspace does not carry a notification provider, so the handler just
/// records that the notification would have been sent.
async fn send_notification(job: &Job) -> Result<serde_json::Value, String> {
    info!(job_id = %job.id, payload = %job.payload, "notification_dispatched");
    Ok(serde_json::json!({"dispatched": true}))
}

async fn incident_summary(pool: &PgPool, job: &Job) -> Result<serde_json::Value, String> {
    let incident_id = job
        .payload
        .get("incident_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| "missing incident_id in payload".to_string())?;

    let row: Option<(String, String)> =
        sqlx::query_as("SELECT title, status FROM incidents WHERE id = $1")
            .bind(incident_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| e.to_string())?;
    let (title, status) = row.ok_or_else(|| "incident not found".to_string())?;

    Ok(serde_json::json!({"incident_id": incident_id, "summary": format!("{title} is {status}")}))
}
