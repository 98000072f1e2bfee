mod test_utils;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use common_security::{Role, TenantContext};
use control_plane::http::extractors::TenantCtxExtractor;
use control_plane::http::incident_handlers::{
    change_status, create, ChangeStatusBody, CreateIncidentBody,
};
use http_body_util::BodyExt;
use test_utils::lazy_app_state;
use uuid::Uuid;

fn engineer_ctx() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Engineer)
}

fn viewer_ctx() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Viewer)
}

#[tokio::test]
async fn create_rejects_short_title_before_touching_the_database() {
    let state = lazy_app_state();
    let body = CreateIncidentBody {
        title: "bad".into(),
        severity: "SEV2".into(),
        service: "checkout".into(),
        environment: "PROD".into(),
        tags: vec![],
    };

    let result = create(State(state), TenantCtxExtractor(engineer_ctx()), Json(body)).await;
    let err = result.expect_err("short title must be rejected");
    let resp = err.into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("invalid_incident"));
}

#[tokio::test]
async fn create_rejects_unknown_severity() {
    let state = lazy_app_state();
    let body = CreateIncidentBody {
        title: "payment gateway returning 500s".into(),
        severity: "CATASTROPHIC".into(),
        service: "checkout".into(),
        environment: "PROD".into(),
        tags: vec![],
    };

    let result = create(State(state), TenantCtxExtractor(engineer_ctx()), Json(body)).await;
    let err = result.expect_err("unknown severity must be rejected");
    let resp = err.into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewer_cannot_create_incidents() {
    let state = lazy_app_state();
    let body = CreateIncidentBody {
        title: "payment gateway returning 500s".into(),
        severity: "SEV2".into(),
        service: "checkout".into(),
        environment: "PROD".into(),
        tags: vec![],
    };

    let result = create(State(state), TenantCtxExtractor(viewer_ctx()), Json(body)).await;
    let err = result.expect_err("viewer must not be able to write");
    let resp = err.into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn change_status_rejects_unparseable_status() {
    let state = lazy_app_state();
    let body = ChangeStatusBody { status: "ON_FIRE".into(), message: None };

    let result = change_status(
        State(state),
        TenantCtxExtractor(engineer_ctx()),
        Path(Uuid::new_v4()),
        Json(body),
    )
    .await;
    let err = result.expect_err("unknown status must be rejected");
    let resp = err.into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
}
