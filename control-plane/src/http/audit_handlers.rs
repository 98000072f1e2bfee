use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::ApiResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::db::audit::{self, AuditFilter, AuditLogEntry};
use crate::http::extractors::TenantCtxExtractor;
use crate::http::rate_limit::read_limit;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub logs: Vec<AuditLogEntry>,
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

pub async fn list(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditLogResponse>> {
    read_limit(&state, &ctx)?;
    let filter = AuditFilter {
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        actor_id: query.actor_id,
        action: query.action,
        since: query.start_date,
        until: query.end_date,
        cursor: query.cursor,
        limit: query.limit,
    };
    let page = audit::list(&state.pool, &ctx, filter)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(AuditLogResponse {
        logs: page.items,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}
