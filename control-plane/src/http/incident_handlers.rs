use axum::extract::{Path, Query, State};
use axum::Json;
use common_http_errors::ApiResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::db::incidents::{self, Incident, IncidentFilter, NewIncident, TimelineEvent};
use crate::http::extractors::TenantCtxExtractor;
use crate::http::rate_limit::{read_limit, write_limit};
use crate::incidents::{Environment, IncidentStatus, Severity, TimelineEventType};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub incidents: Vec<T>,
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListIncidentsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub environment: Option<String>,
    pub service: Option<String>,
    pub tag: Option<String>,
    pub assignee: Option<Uuid>,
    pub search: Option<String>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}


pub async fn list(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Query(query): Query<ListIncidentsQuery>,
) -> ApiResult<Json<PageResponse<Incident>>> {
    read_limit(&state, &ctx)?;

    let filter = IncidentFilter {
        status: query.status.as_deref().and_then(IncidentStatus::parse),
        severity: query.severity.as_deref().and_then(Severity::parse),
        environment: query.environment.as_deref().and_then(Environment::parse),
        service: query.service,
        tag: query.tag,
        assignee: query.assignee,
        search: query.search,
        cursor: query.cursor,
        limit: query.limit,
    };

    let page = incidents::list(&state.pool, &ctx, filter)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(PageResponse {
        incidents: page.items,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
) -> ApiResult<Json<Incident>> {
    read_limit(&state, &ctx)?;
    let incident = incidents::get(&state.pool, &ctx, incident_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct CreateIncidentBody {
    pub title: String,
    pub severity: String,
    pub service: String,
    pub environment: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<CreateIncidentBody>,
) -> ApiResult<Json<Incident>> {
    write_limit(&state, &ctx)?;

    let severity = Severity::parse(&body.severity)
        .ok_or_else(|| common_http_errors::ApiError::bad_request("invalid_severity", ctx.trace_id))?;
    let environment = Environment::parse(&body.environment)
        .ok_or_else(|| common_http_errors::ApiError::bad_request("invalid_environment", ctx.trace_id))?;

    let new = NewIncident { title: body.title, severity, service: body.service, environment, tags: body.tags };
    let incident = incidents::create(&state.pool, &ctx, new)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusBody {
    pub status: String,
    pub message: Option<String>,
}

pub async fn change_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
    Json(body): Json<ChangeStatusBody>,
) -> ApiResult<Json<Incident>> {
    write_limit(&state, &ctx)?;
    let new_status = IncidentStatus::parse(&body.status)
        .ok_or_else(|| common_http_errors::ApiError::bad_request("invalid_status", ctx.trace_id))?;
    let incident = incidents::change_status(&state.pool, &ctx, &state.metrics, incident_id, new_status, body.message)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub assignee_id: Option<Uuid>,
}

pub async fn assign(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> ApiResult<Json<Incident>> {
    write_limit(&state, &ctx)?;
    let incident = incidents::assign(&state.pool, &ctx, incident_id, body.assignee_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct AddTimelineEventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
}

pub async fn add_timeline_event(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
    Json(body): Json<AddTimelineEventBody>,
) -> ApiResult<Json<TimelineEvent>> {
    write_limit(&state, &ctx)?;
    let event_type = TimelineEventType::parse(&body.event_type)
        .ok_or_else(|| common_http_errors::ApiError::bad_request("invalid_event_type", ctx.trace_id))?;
    let event = incidents::add_timeline_event(&state.pool, &ctx, incident_id, event_type, body.message)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(event))
}

pub async fn list_timeline(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TimelineEvent>>> {
    read_limit(&state, &ctx)?;
    let events = incidents::list_timeline(&state.pool, &ctx, incident_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(events))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
) -> ApiResult<Json<Vec<incidents::Attachment>>> {
    read_limit(&state, &ctx)?;
    let attachments = incidents::list_attachments(&state.pool, &ctx, incident_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(attachments))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
    mut multipart: axum::extract::Multipart,
) -> ApiResult<Json<incidents::Attachment>> {
    write_limit(&state, &ctx)?;

    let mut file_name = None;
    let mut mime_type = None;
    let mut size_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| common_http_errors::ApiError::bad_request("invalid_multipart", ctx.trace_id))?
    {
        if field.name() != Some("file") {
            continue;
        }
        file_name = field.file_name().map(|s| s.to_string());
        mime_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|_| common_http_errors::ApiError::bad_request("invalid_multipart", ctx.trace_id))?;
        size_bytes = Some(data.len() as i64);
    }

    let file_name = file_name
        .ok_or_else(|| common_http_errors::ApiError::bad_request("attachment_rejected", ctx.trace_id))?;
    let mime_type = mime_type
        .ok_or_else(|| common_http_errors::ApiError::bad_request("attachment_rejected", ctx.trace_id))?;
    let size_bytes = size_bytes
        .ok_or_else(|| common_http_errors::ApiError::bad_request("attachment_rejected", ctx.trace_id))?;

    let attachment =
        incidents::create_attachment(&state.pool, &ctx, incident_id, file_name, mime_type, size_bytes)
            .await
            .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(attachment))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path((incident_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    write_limit(&state, &ctx)?;
    incidents::delete_attachment(&state.pool, &ctx, incident_id, attachment_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(serde_json::json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignBody {
    pub incident_ids: Vec<Uuid>,
    pub assignee_id: Uuid,
}

pub async fn bulk_assign(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<BulkAssignBody>,
) -> ApiResult<Json<serde_json::Value>> {
    write_limit(&state, &ctx)?;
    let updated = incidents::bulk_assign(&state.pool, &ctx, &body.incident_ids, body.assignee_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(serde_json::json!({"updated": updated})))
}

#[derive(Debug, Deserialize)]
pub struct BulkChangeStatusBody {
    pub incident_ids: Vec<Uuid>,
    pub status: String,
}

pub async fn bulk_change_status(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<BulkChangeStatusBody>,
) -> ApiResult<Json<serde_json::Value>> {
    write_limit(&state, &ctx)?;
    let new_status = IncidentStatus::parse(&body.status)
        .ok_or_else(|| common_http_errors::ApiError::bad_request("invalid_status", ctx.trace_id))?;
    let updated = incidents::bulk_change_status(&state.pool, &ctx, &state.metrics, &body.incident_ids, new_status)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(serde_json::json!({"updated": updated})))
}
