mod test_utils;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use common_security::{Role, TenantContext};
use control_plane::http::audit_handlers::{list, AuditQuery};
use control_plane::http::extractors::TenantCtxExtractor;
use test_utils::lazy_app_state;
use uuid::Uuid;

fn engineer_ctx() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Engineer)
}

fn admin_ctx() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin)
}

/// Audit log access is ADMIN-only; the role gate runs before any query, so
/// an ENGINEER is rejected without touching the database.
#[tokio::test]
async fn engineer_cannot_view_audit_log() {
    let state = lazy_app_state();
    let query = AuditQuery {
        entity_type: None,
        entity_id: None,
        actor_id: None,
        action: None,
        start_date: None,
        end_date: None,
        cursor: None,
        limit: None,
    };

    let result = list(State(state), TenantCtxExtractor(engineer_ctx()), Query(query)).await;
    let err = result.expect_err("engineer must not see the audit log");
    assert_eq!(err.into_response().status(), axum::http::StatusCode::FORBIDDEN);
}

/// Sanity check that the ADMIN role itself is accepted by the gate (the
/// eventual database error, since this pool never actually connects, is
/// expected and not what this test is checking).
#[tokio::test]
async fn admin_role_clears_the_audit_gate() {
    let state = lazy_app_state();
    let query = AuditQuery {
        entity_type: None,
        entity_id: None,
        actor_id: None,
        action: None,
        start_date: None,
        end_date: None,
        cursor: None,
        limit: None,
    };

    let result = list(State(state), TenantCtxExtractor(admin_ctx()), Query(query)).await;
    match result {
        Err(err) => {
            let status = err.into_response().status();
            assert_ne!(status, axum::http::StatusCode::FORBIDDEN);
        }
        Ok(_) => panic!("unexpected success against an unconnected pool"),
    }
}
