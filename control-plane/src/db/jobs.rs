use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub const MAX_RETRIES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    ScanAttachment,
    SendNotification,
    IncidentSummary,
}

impl JobType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCAN_ATTACHMENT" => Some(Self::ScanAttachment),
            "SEND_NOTIFICATION" => Some(Self::SendNotification),
            "INCIDENT_SUMMARY" => Some(Self::IncidentSummary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanAttachment => "SCAN_ATTACHMENT",
            Self::SendNotification => "SEND_NOTIFICATION",
            Self::IncidentSummary => "INCIDENT_SUMMARY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[sqlx(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Enqueues a job inside the caller's transaction, so it only becomes
/// visible to the worker if the surrounding mutation (e.g. the attachment
/// insert that triggers a scan) actually commits.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    job_type: JobType,
    payload: serde_json::Value,
) -> sqlx::Result<Job> {
    sqlx::query_as::<_, Job>(
        r#"
        INSERT INTO jobs (id, tenant_id, type, payload, status, retries)
        VALUES ($1, $2, $3, $4, $5, 0)
        RETURNING id, tenant_id, type, payload, status, result, error, retries, created_at, updated_at, processed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(job_type.as_str())
    .bind(payload)
    .bind(JobStatus::Pending.as_str())
    .fetch_one(&mut **tx)
    .await
}

/// Pulls up to `batch_size` pending jobs and atomically marks them
/// PROCESSING, so two worker instances never pick up the same row.
pub async fn fetch_pending_batch(pool: &PgPool, batch_size: i64) -> sqlx::Result<Vec<Job>> {
    sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs SET status = 'PROCESSING', updated_at = now()
        WHERE id IN (
            SELECT id FROM jobs WHERE status = 'PENDING' ORDER BY created_at ASC LIMIT $1 FOR UPDATE SKIP LOCKED
        )
        RETURNING id, tenant_id, type, payload, status, result, error, retries, created_at, updated_at, processed_at
        "#,
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await
}

pub async fn complete(pool: &PgPool, job_id: Uuid, result: serde_json::Value) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE jobs SET status = 'COMPLETED', result = $1, processed_at = now(), updated_at = now() WHERE id = $2",
    )
    .bind(result)
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a failed attempt. Below `MAX_RETRIES` the job goes back to
/// PENDING so the next poll retries it; at the budget it is marked FAILED
/// for good, with the last error preserved.
pub async fn fail(pool: &PgPool, job_id: Uuid, retries: i32, error: &str) -> sqlx::Result<()> {
    if retries >= MAX_RETRIES {
        sqlx::query(
            "UPDATE jobs SET status = 'FAILED', error = $1, retries = $2, processed_at = now(), updated_at = now() WHERE id = $3",
        )
        .bind(error)
        .bind(retries + 1)
        .bind(job_id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "UPDATE jobs SET status = 'PENDING', error = $1, retries = $2, updated_at = now() WHERE id = $3",
        )
        .bind(error)
        .bind(retries + 1)
        .bind(job_id)
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for t in [JobType::ScanAttachment, JobType::SendNotification, JobType::IncidentSummary] {
            assert_eq!(JobType::parse(t.as_str()), Some(t));
        }
    }
}
