use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::app::AppState;
use crate::http::{audit_handlers, flag_handlers, incident_handlers, saved_view_handlers};
use crate::realtime;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/incidents", get(incident_handlers::list).post(incident_handlers::create))
        .route(
            "/incidents/:id",
            get(incident_handlers::get).patch(incident_handlers::change_status),
        )
        .route(
            "/incidents/:id/timeline",
            get(incident_handlers::list_timeline).post(incident_handlers::add_timeline_event),
        )
        .route("/incidents/:id/assign", post(incident_handlers::assign))
        .route(
            "/incidents/:id/attachments",
            get(incident_handlers::list_attachments).post(incident_handlers::upload_attachment),
        )
        .route(
            "/incidents/:id/attachments/:attachment_id",
            delete(incident_handlers::delete_attachment),
        )
        .route("/incidents/:id/stream", get(realtime::stream_incident))
        .route("/incidents/bulk-assign", post(incident_handlers::bulk_assign))
        .route("/incidents/bulk-status", post(incident_handlers::bulk_change_status))
        .route("/feature-flags", get(flag_handlers::list).post(flag_handlers::create))
        .route(
            "/feature-flags/:id",
            patch(flag_handlers::set_enabled).delete(flag_handlers::delete),
        )
        .route("/feature-flags/:id/evaluate", post(flag_handlers::evaluate_flag))
        .route("/feature-flags/:id/rules", post(flag_handlers::replace_rules))
        .route("/audit-logs", get(audit_handlers::list))
        .route(
            "/tenants/saved-views",
            get(saved_view_handlers::list).post(saved_view_handlers::create),
        )
        .route("/tenants/saved-views/:id", delete(saved_view_handlers::delete))
}
