use axum::extract::{Path, Query, State};
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::flags::{self, FeatureFlag, NewFlag};
use crate::flags::{evaluate, EvalResult, FlagForEval, Rule};
use crate::http::extractors::TenantCtxExtractor;
use crate::http::rate_limit::{read_limit, write_limit};
use crate::incidents::Environment;

#[derive(Debug, Deserialize)]
pub struct EnvironmentQuery {
    pub environment: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Query(query): Query<EnvironmentQuery>,
) -> ApiResult<Json<Vec<FeatureFlag>>> {
    read_limit(&state, &ctx)?;
    let environment = query.environment.as_deref().and_then(Environment::parse);
    let flags_list = flags::list(&state.pool, &ctx, environment)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(flags_list))
}

pub async fn get(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<Json<FeatureFlag>> {
    read_limit(&state, &ctx)?;
    let flag = flags::get(&state.pool, &ctx, flag_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(flag))
}

#[derive(Debug, Deserialize)]
pub struct CreateFlagBody {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub environment: String,
    #[serde(default)]
    pub enabled: bool,
}

pub async fn create(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<CreateFlagBody>,
) -> ApiResult<Json<FeatureFlag>> {
    write_limit(&state, &ctx)?;
    let environment = Environment::parse(&body.environment)
        .ok_or_else(|| ApiError::bad_request("invalid_environment", ctx.trace_id))?;
    let new = NewFlag {
        key: body.key,
        name: body.name,
        description: body.description,
        environment,
        enabled: body.enabled,
    };
    let flag = flags::create(&state.pool, &ctx, new)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(flag))
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledBody {
    pub enabled: bool,
}

pub async fn set_enabled(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(flag_id): Path<Uuid>,
    Json(body): Json<SetEnabledBody>,
) -> ApiResult<Json<FeatureFlag>> {
    write_limit(&state, &ctx)?;
    let flag = flags::set_enabled(&state.pool, &ctx, flag_id, body.enabled)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(flag))
}

pub async fn delete(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    write_limit(&state, &ctx)?;
    flags::delete(&state.pool, &ctx, flag_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRulesBody {
    pub rules: Vec<Rule>,
}

pub async fn replace_rules(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(flag_id): Path<Uuid>,
    Json(body): Json<ReplaceRulesBody>,
) -> ApiResult<Json<FeatureFlag>> {
    write_limit(&state, &ctx)?;
    let flag = flags::replace_rules(&state.pool, &ctx, flag_id, body.rules)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    Ok(Json(flag))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateContext {
    pub user_id: Uuid,
    pub environment: String,
    #[serde(default)]
    pub service: Option<String>,
}

pub async fn evaluate_flag(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(flag_id): Path<Uuid>,
    Json(context): Json<EvaluateContext>,
) -> ApiResult<Json<EvalResult>> {
    read_limit(&state, &ctx)?;
    let flag = flags::get(&state.pool, &ctx, flag_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;

    let for_eval = FlagForEval {
        key: &flag.key,
        enabled: flag.enabled,
        environment: &flag.environment,
        rules: &flag.rules,
    };
    let result = evaluate(&for_eval, context.user_id, &context.environment);

    state
        .metrics
        .flag_evaluations_total
        .with_label_values(&[&flag.key, &result.enabled.to_string()])
        .inc();

    Ok(Json(result))
}
