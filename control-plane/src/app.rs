use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use common_auth::JwtVerifier;
use common_observability::ControlPlaneMetrics;
use prometheus::{Encoder, TextEncoder};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AppConfig;
use crate::http::rate_limit::RateLimiter;
use crate::http::routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub session_key: [u8; 32],
    pub metrics: Arc<ControlPlaneMetrics>,
    pub rate_limiter: Arc<RateLimiter>,
    pub allowed_origins: Vec<String>,
    pub rate_limit_reads_per_min: u32,
    pub rate_limit_writes_per_min: u32,
    pub realtime_poll_ms: u64,
}

impl AppState {
    pub fn realtime_poll_ms(&self) -> u64 {
        self.realtime_poll_ms
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let cors = build_cors_layer(&state.allowed_origins);
    let _ = config;

    let api = routes::router()
        .layer(axum::middleware::from_fn(crate::http::csrf::csrf_guard))
        .layer(axum::middleware::from_fn_with_state(state.clone(), http_error_metrics));

    Router::new()
        .nest("/api/v1", api)
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state)
}

/// Counts every response with status >= 400, keyed by the `X-Error-Code`
/// header `ApiError` stamps on its own responses. Unmatched routes and
/// framework-level rejections fall under "unknown".
async fn http_error_metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        state
            .metrics
            .http_errors_total
            .with_label_values(&["control-plane", code, status.as_str()])
            .inc();
    }
    resp
}

/// Restricts cross-origin `fetch`/XHR access to the configured allow-list.
/// `CorsLayer` is a separate concern from `csrf::csrf_guard`: this governs
/// whether a browser lets JS on another origin read the response at all;
/// the CSRF guard governs whether the request is accepted in the first
/// place. An empty allow-list (no `ALLOWED_ORIGINS` set) falls back to
/// permissive, matching local development with no configured origins.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|origin| axum::http::HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let metric_families = state.metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "metrics_encode_failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
