use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::ApiResult;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::saved_views::{self, SavedView};
use crate::http::extractors::TenantCtxExtractor;
use crate::http::rate_limit::{read_limit, write_limit};

pub async fn list(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
) -> ApiResult<Json<Vec<SavedView>>> {
    read_limit(&state, &ctx)?;
    let views = saved_views::list_for_user(&state.pool, &ctx)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct CreateSavedViewBody {
    pub name: String,
    #[serde(default)]
    pub filters: serde_json::Value,
}

pub async fn create(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<CreateSavedViewBody>,
) -> ApiResult<Json<SavedView>> {
    write_limit(&state, &ctx)?;
    let view = saved_views::create(&state.pool, &ctx, body.name, body.filters)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(view))
}

pub async fn delete(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(view_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    write_limit(&state, &ctx)?;
    saved_views::delete(&state.pool, &ctx, view_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(serde_json::json!({"success": true})))
}
