use chrono::{DateTime, Utc};
use common_audit::{write_audit_row, AuditActor};
use common_observability::ControlPlaneMetrics;
use common_security::{Role, TenantContext};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::db::jobs::{self, JobType};
use crate::db::{clamp_limit, Cursorable, Page};
use crate::incidents::{
    state_machine::{next_states, validate_transition},
    Environment, IncidentError, IncidentStatus, Severity, TimelineEventType,
};

#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub service: String,
    pub environment: Environment,
    pub tags: Vec<String>,
    pub created_by_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    severity: String,
    status: String,
    service: String,
    environment: String,
    tags: serde_json::Value,
    created_by_id: Uuid,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = IncidentError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let severity = Severity::parse(&row.severity)
            .ok_or_else(|| IncidentError::Validation(format!("bad severity: {}", row.severity)))?;
        let status = IncidentStatus::parse(&row.status)
            .ok_or_else(|| IncidentError::Validation(format!("bad status: {}", row.status)))?;
        let environment = Environment::parse(&row.environment).ok_or_else(|| {
            IncidentError::Validation(format!("bad environment: {}", row.environment))
        })?;
        let tags = serde_json::from_value(row.tags).unwrap_or_default();
        Ok(Incident {
            id: row.id,
            tenant_id: row.tenant_id,
            title: row.title,
            severity,
            status,
            service: row.service,
            environment,
            tags,
            created_by_id: row.created_by_id,
            assignee_id: row.assignee_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub tenant_id: Uuid,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub tenant_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_url: String,
    pub scan_status: String,
    pub created_at: DateTime<Utc>,
}

impl Cursorable for Incident {
    fn cursor(&self) -> Uuid {
        self.id
    }
}

pub struct NewIncident {
    pub title: String,
    pub severity: Severity,
    pub service: String,
    pub environment: Environment,
    pub tags: Vec<String>,
}

fn actor_of(ctx: &TenantContext) -> AuditActor {
    AuditActor::from_principal(ctx.principal_user_id, None, None)
}

fn ensure_can_write(ctx: &TenantContext) -> Result<(), IncidentError> {
    if ctx.role.can_write() {
        Ok(())
    } else {
        Err(IncidentError::Forbidden)
    }
}

async fn insert_timeline_event(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    incident_id: Uuid,
    event_type: TimelineEventType,
    message: Option<&str>,
    data: Option<serde_json::Value>,
    created_by_id: Uuid,
) -> Result<TimelineEvent, IncidentError> {
    let event = sqlx::query_as::<_, TimelineEvent>(
        r#"
        INSERT INTO timeline_events (id, incident_id, tenant_id, type, message, data, created_by_id, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        RETURNING id, incident_id, tenant_id, type, message, data, created_by_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(incident_id)
    .bind(tenant_id)
    .bind(event_type.as_str())
    .bind(message)
    .bind(data)
    .bind(created_by_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(event)
}

pub async fn create(
    pool: &PgPool,
    ctx: &TenantContext,
    new: NewIncident,
) -> Result<Incident, IncidentError> {
    ensure_can_write(ctx)?;
    if new.title.trim().chars().count() < 5 {
        return Err(IncidentError::Validation(
            "title must be at least 5 characters".into(),
        ));
    }
    if new.service.trim().is_empty() {
        return Err(IncidentError::Validation("service must not be empty".into()));
    }

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, IncidentRow>(
        r#"
        INSERT INTO incidents (id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL)
        RETURNING id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(&new.title)
    .bind(new.severity.as_str())
    .bind(IncidentStatus::Open.as_str())
    .bind(&new.service)
    .bind(new.environment.as_str())
    .bind(serde_json::to_value(&new.tags).unwrap())
    .bind(ctx.principal_user_id)
    .fetch_one(&mut *tx)
    .await?;
    let incident = Incident::try_from(row)?;

    insert_timeline_event(
        &mut tx,
        ctx.tenant_id,
        incident.id,
        TimelineEventType::StatusChange,
        None,
        Some(serde_json::json!({"from": null, "to": IncidentStatus::Open.as_str()})),
        ctx.principal_user_id,
    )
    .await?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "incident",
        Some(incident.id),
        "CREATE",
        serde_json::json!({}),
        serde_json::to_value(&incident).unwrap_or_default(),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(incident)
}

pub async fn get(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
) -> Result<Incident, IncidentError> {
    let row = sqlx::query_as::<_, IncidentRow>(
        r#"
        SELECT id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at
        FROM incidents WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(IncidentError::NotFound)?;
    Incident::try_from(row)
}

#[derive(Debug, Default)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub environment: Option<Environment>,
    pub service: Option<String>,
    pub tag: Option<String>,
    pub assignee: Option<Uuid>,
    pub search: Option<String>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn list(
    pool: &PgPool,
    ctx: &TenantContext,
    filter: IncidentFilter,
) -> Result<Page<Incident>, IncidentError> {
    let limit = clamp_limit(filter.limit, 20, 100);

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at FROM incidents WHERE tenant_id = ",
    );
    builder.push_bind(ctx.tenant_id);

    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(severity) = filter.severity {
        builder.push(" AND severity = ");
        builder.push_bind(severity.as_str());
    }
    if let Some(environment) = filter.environment {
        builder.push(" AND environment = ");
        builder.push_bind(environment.as_str());
    }
    if let Some(service) = &filter.service {
        builder.push(" AND service ILIKE ");
        builder.push_bind(format!("%{service}%"));
    }
    if let Some(tag) = &filter.tag {
        builder.push(" AND tags @> ");
        builder.push_bind(serde_json::json!([tag]));
    }
    if let Some(assignee) = filter.assignee {
        builder.push(" AND assignee_id = ");
        builder.push_bind(assignee);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR service ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(cursor) = filter.cursor {
        builder.push(" AND id < ");
        builder.push_bind(cursor);
    }

    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(limit + 1);

    let rows: Vec<IncidentRow> = builder.build_query_as().fetch_all(pool).await?;
    let incidents = rows
        .into_iter()
        .map(Incident::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::from_fetched(incidents, limit as usize))
}

pub async fn change_status(
    pool: &PgPool,
    ctx: &TenantContext,
    metrics: &ControlPlaneMetrics,
    incident_id: Uuid,
    new_status: IncidentStatus,
    message: Option<String>,
) -> Result<Incident, IncidentError> {
    ensure_can_write(ctx)?;

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, IncidentRow>(
        "SELECT id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at FROM incidents WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(IncidentError::NotFound)?;
    let before = Incident::try_from(row)?;

    validate_transition(before.status, new_status).map_err(|_| IncidentError::InvalidTransition {
        allowed: next_states(before.status).to_vec(),
    })?;

    let row = sqlx::query_as::<_, IncidentRow>(
        r#"
        UPDATE incidents SET status = $1, updated_at = now()
        WHERE id = $2 AND tenant_id = $3
        RETURNING id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at
        "#,
    )
    .bind(new_status.as_str())
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_one(&mut *tx)
    .await?;
    let after = Incident::try_from(row)?;

    insert_timeline_event(
        &mut tx,
        ctx.tenant_id,
        incident_id,
        TimelineEventType::StatusChange,
        None,
        Some(serde_json::json!({"from": before.status.as_str(), "to": new_status.as_str()})),
        ctx.principal_user_id,
    )
    .await?;

    if let Some(message) = message.as_ref().filter(|m| !m.trim().is_empty()) {
        insert_timeline_event(
            &mut tx,
            ctx.tenant_id,
            incident_id,
            TimelineEventType::Note,
            Some(message),
            None,
            ctx.principal_user_id,
        )
        .await?;
    }

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "incident",
        Some(incident_id),
        "STATUS_CHANGE",
        serde_json::to_value(&before).unwrap_or_default(),
        serde_json::to_value(&after).unwrap_or_default(),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    metrics
        .incident_transitions_total
        .with_label_values(&[before.status.as_str(), new_status.as_str()])
        .inc();
    Ok(after)
}

pub async fn assign(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
    assignee_id: Option<Uuid>,
) -> Result<Incident, IncidentError> {
    ensure_can_write(ctx)?;

    if let Some(assignee_id) = assignee_id {
        if !crate::db::tenant::is_member(pool, ctx.tenant_id, assignee_id).await? {
            return Err(IncidentError::AssigneeNotInTenant);
        }
    }

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, IncidentRow>(
        "SELECT id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at FROM incidents WHERE id = $1 AND tenant_id = $2",
    )
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(IncidentError::NotFound)?;
    let before = Incident::try_from(row)?;

    let row = sqlx::query_as::<_, IncidentRow>(
        r#"
        UPDATE incidents SET assignee_id = $1, updated_at = now()
        WHERE id = $2 AND tenant_id = $3
        RETURNING id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at
        "#,
    )
    .bind(assignee_id)
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_one(&mut *tx)
    .await?;
    let after = Incident::try_from(row)?;

    insert_timeline_event(
        &mut tx,
        ctx.tenant_id,
        incident_id,
        TimelineEventType::Action,
        Some("assignee changed"),
        Some(serde_json::json!({"from": before.assignee_id, "to": assignee_id})),
        ctx.principal_user_id,
    )
    .await?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "incident",
        Some(incident_id),
        "ASSIGN",
        serde_json::to_value(&before).unwrap_or_default(),
        serde_json::to_value(&after).unwrap_or_default(),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(after)
}

pub async fn add_timeline_event(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
    event_type: TimelineEventType,
    message: String,
) -> Result<TimelineEvent, IncidentError> {
    ensure_can_write(ctx)?;
    if matches!(event_type, TimelineEventType::StatusChange) {
        return Err(IncidentError::Validation(
            "status change events can only be produced by the transition endpoint".into(),
        ));
    }
    if message.trim().is_empty() {
        return Err(IncidentError::Validation("message must not be empty".into()));
    }

    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM incidents WHERE id = $1 AND tenant_id = $2")
            .bind(incident_id)
            .bind(ctx.tenant_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(IncidentError::NotFound);
    }

    let mut tx = pool.begin().await?;
    let event = insert_timeline_event(
        &mut tx,
        ctx.tenant_id,
        incident_id,
        event_type,
        Some(&message),
        None,
        ctx.principal_user_id,
    )
    .await?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "timeline_event",
        Some(event.id),
        "CREATE",
        serde_json::json!({}),
        serde_json::to_value(&event).unwrap_or_default(),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(event)
}

pub async fn list_timeline(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
) -> Result<Vec<TimelineEvent>, IncidentError> {
    let events = sqlx::query_as::<_, TimelineEvent>(
        "SELECT id, incident_id, tenant_id, type, message, data, created_by_id, created_at FROM timeline_events WHERE incident_id = $1 AND tenant_id = $2 ORDER BY created_at DESC",
    )
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

pub async fn list_attachments(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
) -> Result<Vec<Attachment>, IncidentError> {
    let attachments = sqlx::query_as::<_, Attachment>(
        "SELECT id, incident_id, tenant_id, file_name, mime_type, size_bytes, storage_url, scan_status, created_at FROM attachments WHERE incident_id = $1 AND tenant_id = $2 ORDER BY created_at DESC",
    )
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(attachments)
}

const MAX_ATTACHMENT_BYTES: i64 = 10 * 1024 * 1024;

const ALLOWED_ATTACHMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/gif",
];

/// Persists an uploaded attachment and enqueues its malware scan in the
/// same transaction, so a scan job never exists for a row that didn't
/// actually commit. Size and MIME type are validated before anything is
/// written.
pub async fn create_attachment(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
    file_name: String,
    mime_type: String,
    size_bytes: i64,
) -> Result<Attachment, IncidentError> {
    ensure_can_write(ctx)?;
    if size_bytes > MAX_ATTACHMENT_BYTES {
        return Err(IncidentError::AttachmentRejected(format!(
            "file exceeds the {MAX_ATTACHMENT_BYTES}-byte limit"
        )));
    }
    if !ALLOWED_ATTACHMENT_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(IncidentError::AttachmentRejected(format!(
            "mime type {mime_type} is not allowed"
        )));
    }

    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM incidents WHERE id = $1 AND tenant_id = $2")
            .bind(incident_id)
            .bind(ctx.tenant_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(IncidentError::NotFound);
    }

    let mut tx = pool.begin().await?;
    let attachment_id = Uuid::new_v4();
    let storage_url = format!("attachments://{}/{}/{}", ctx.tenant_id, incident_id, attachment_id);

    let attachment = sqlx::query_as::<_, Attachment>(
        r#"
        INSERT INTO attachments (id, incident_id, tenant_id, file_name, mime_type, size_bytes, storage_url, scan_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING')
        RETURNING id, incident_id, tenant_id, file_name, mime_type, size_bytes, storage_url, scan_status, created_at
        "#,
    )
    .bind(attachment_id)
    .bind(incident_id)
    .bind(ctx.tenant_id)
    .bind(&file_name)
    .bind(&mime_type)
    .bind(size_bytes)
    .bind(&storage_url)
    .fetch_one(&mut *tx)
    .await?;

    jobs::enqueue(
        &mut tx,
        ctx.tenant_id,
        JobType::ScanAttachment,
        serde_json::json!({"attachment_id": attachment.id, "incident_id": incident_id}),
    )
    .await?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "attachment",
        Some(attachment.id),
        "CREATE",
        serde_json::json!({}),
        serde_json::to_value(&attachment).unwrap_or_default(),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(attachment)
}

pub async fn delete_attachment(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_id: Uuid,
    attachment_id: Uuid,
) -> Result<(), IncidentError> {
    ensure_can_write(ctx)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM attachments WHERE id = $1 AND incident_id = $2 AND tenant_id = $3")
        .bind(attachment_id)
        .bind(incident_id)
        .bind(ctx.tenant_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(IncidentError::NotFound);
    }

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "attachment",
        Some(attachment_id),
        "DELETE",
        serde_json::json!({}),
        serde_json::json!({}),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(())
}

/// Bulk assignment: every selected incident gets the same assignee in one
/// transaction. Unlike bulk status change there is no per-row legality
/// check beyond tenant scoping, so a short-row-count update suffices.
pub async fn bulk_assign(
    pool: &PgPool,
    ctx: &TenantContext,
    incident_ids: &[Uuid],
    assignee_id: Uuid,
) -> Result<u64, IncidentError> {
    ensure_can_write(ctx)?;
    if !crate::db::tenant::is_member(pool, ctx.tenant_id, assignee_id).await? {
        return Err(IncidentError::AssigneeNotInTenant);
    }

    let mut tx = pool.begin().await?;
    let mut updated = 0u64;
    for incident_id in incident_ids {
        let result = sqlx::query(
            "UPDATE incidents SET assignee_id = $1, updated_at = now() WHERE id = $2 AND tenant_id = $3",
        )
        .bind(assignee_id)
        .bind(incident_id)
        .bind(ctx.tenant_id)
        .execute(&mut *tx)
        .await?;
        updated += result.rows_affected();
    }

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &actor_of(ctx),
        "incident",
        None,
        "BULK_ASSIGN",
        serde_json::json!({}),
        serde_json::json!({"incident_ids": incident_ids, "assignee_id": assignee_id, "updated": updated}),
    )
    .await
    .map_err(|e| IncidentError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(updated)
}

/// Bulk status change. Every selected incident is validated *before* any
/// row is touched; if a single one lacks a legal path to `new_status` the
/// whole operation fails and nothing is written.
pub async fn bulk_change_status(
    pool: &PgPool,
    ctx: &TenantContext,
    metrics: &ControlPlaneMetrics,
    incident_ids: &[Uuid],
    new_status: IncidentStatus,
) -> Result<u64, IncidentError> {
    ensure_can_write(ctx)?;

    let mut tx = pool.begin().await?;

    let mut current = Vec::with_capacity(incident_ids.len());
    for incident_id in incident_ids {
        let row = sqlx::query_as::<_, IncidentRow>(
            "SELECT id, tenant_id, title, severity, status, service, environment, tags, created_by_id, assignee_id, created_at, updated_at FROM incidents WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(incident_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(IncidentError::NotFound)?;
        let incident = Incident::try_from(row)?;
        validate_transition(incident.status, new_status).map_err(|_| {
            IncidentError::InvalidTransition {
                allowed: next_states(incident.status).to_vec(),
            }
        })?;
        current.push(incident);
    }

    for incident in &current {
        sqlx::query("UPDATE incidents SET status = $1, updated_at = now() WHERE id = $2 AND tenant_id = $3")
            .bind(new_status.as_str())
            .bind(incident.id)
            .bind(ctx.tenant_id)
            .execute(&mut *tx)
            .await?;

        insert_timeline_event(
            &mut tx,
            ctx.tenant_id,
            incident.id,
            TimelineEventType::StatusChange,
            None,
            Some(serde_json::json!({"from": incident.status.as_str(), "to": new_status.as_str()})),
            ctx.principal_user_id,
        )
        .await?;

        let after = Incident { status: new_status, ..incident.clone() };
        write_audit_row(
            &mut tx,
            ctx.tenant_id,
            &actor_of(ctx),
            "incident",
            Some(incident.id),
            "STATUS_CHANGE",
            serde_json::to_value(incident).unwrap_or_default(),
            serde_json::to_value(&after).unwrap_or_default(),
        )
        .await
        .map_err(|e| IncidentError::Validation(e.to_string()))?;
    }

    tx.commit().await?;
    for incident in &current {
        metrics
            .incident_transitions_total
            .with_label_values(&[incident.status.as_str(), new_status.as_str()])
            .inc();
    }
    Ok(current.len() as u64)
}

pub fn ensure_role(ctx: &TenantContext, required: Role) -> Result<(), IncidentError> {
    if ctx.role.at_least(required) {
        Ok(())
    } else {
        Err(IncidentError::Forbidden)
    }
}
