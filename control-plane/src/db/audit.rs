use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use common_security::TenantContext;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::{clamp_limit, Cursorable, Page};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_name: Option<String>,
    pub actor_email: Option<String>,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub changes: serde_json::Value,
    pub meta: serde_json::Value,
}

impl Cursorable for AuditLogEntry {
    fn cursor(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditQueryError {
    #[error("forbidden")]
    Forbidden,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuditQueryError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        match self {
            AuditQueryError::Forbidden => ApiError::Forbidden { trace_id },
            AuditQueryError::Database(err) => ApiError::internal(err, trace_id),
        }
    }
}

#[derive(Debug, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Admin-only listing over the audit log, modeled on the same
/// `QueryBuilder` + trim-the-extra-row pagination used for incidents.
pub async fn list(
    pool: &PgPool,
    ctx: &TenantContext,
    filter: AuditFilter,
) -> Result<Page<AuditLogEntry>, AuditQueryError> {
    if !ctx.role.can_view_audit() {
        return Err(AuditQueryError::Forbidden);
    }
    let limit = clamp_limit(filter.limit, 20, 100);

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, tenant_id, actor_id, actor_name, actor_email, entity_type, entity_id, action, occurred_at, changes, meta FROM audit_log WHERE tenant_id = ",
    );
    builder.push_bind(ctx.tenant_id);

    if let Some(entity_type) = &filter.entity_type {
        builder.push(" AND entity_type = ");
        builder.push_bind(entity_type.clone());
    }
    if let Some(entity_id) = filter.entity_id {
        builder.push(" AND entity_id = ");
        builder.push_bind(entity_id);
    }
    if let Some(actor_id) = filter.actor_id {
        builder.push(" AND actor_id = ");
        builder.push_bind(actor_id);
    }
    if let Some(action) = &filter.action {
        builder.push(" AND action = ");
        builder.push_bind(action.clone());
    }
    if let Some(since) = filter.since {
        builder.push(" AND occurred_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND occurred_at <= ");
        builder.push_bind(until);
    }
    if let Some(cursor) = filter.cursor {
        builder.push(" AND id < ");
        builder.push_bind(cursor);
    }

    builder.push(" ORDER BY occurred_at DESC, id DESC LIMIT ");
    builder.push_bind(limit + 1);

    let rows: Vec<AuditLogEntry> = builder.build_query_as().fetch_all(pool).await?;
    Ok(Page::from_fetched(rows, limit as usize))
}
