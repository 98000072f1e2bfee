mod test_utils;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use common_security::{Role, TenantContext};
use control_plane::flags::{evaluate, EvalReason, FlagForEval, Rule};
use control_plane::http::extractors::TenantCtxExtractor;
use control_plane::http::flag_handlers::{create, CreateFlagBody};
use test_utils::lazy_app_state;
use uuid::Uuid;

fn engineer_ctx() -> TenantContext {
    TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Engineer)
}

#[tokio::test]
async fn create_rejects_empty_key_before_touching_the_database() {
    let state = lazy_app_state();
    let body = CreateFlagBody {
        key: "   ".into(),
        name: "New checkout".into(),
        description: None,
        environment: "PROD".into(),
        enabled: false,
    };

    let result = create(State(state), TenantCtxExtractor(engineer_ctx()), Json(body)).await;
    let err = result.expect_err("blank key must be rejected");
    assert_eq!(err.into_response().status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_unknown_environment() {
    let state = lazy_app_state();
    let body = CreateFlagBody {
        key: "new-checkout".into(),
        name: "New checkout".into(),
        description: None,
        environment: "QA".into(),
        enabled: false,
    };

    let result = create(State(state), TenantCtxExtractor(engineer_ctx()), Json(body)).await;
    let err = result.expect_err("unknown environment must be rejected");
    assert_eq!(err.into_response().status(), axum::http::StatusCode::BAD_REQUEST);
}

/// Exercises the evaluator the way `evaluate_flag` does, without going
/// through HTTP: a disabled flag always loses to rule matching.
#[tokio::test]
async fn disabled_flag_short_circuits_rule_evaluation() {
    let rules = vec![Rule::Allowlist { user_ids: vec![] }];
    let flag = FlagForEval { key: "new-checkout", enabled: false, environment: "PROD", rules: &rules };
    let result = evaluate(&flag, Uuid::new_v4(), "PROD");
    assert!(!result.enabled);
    assert_eq!(result.reason, EvalReason::FlagDisabled);
}
