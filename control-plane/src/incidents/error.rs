use common_http_errors::ApiError;
use uuid::Uuid;

use super::state_machine::IncidentStatus;

#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    #[error("incident not found")]
    NotFound,
    #[error("assignee is not a member of this tenant")]
    AssigneeNotInTenant,
    #[error("invalid status transition")]
    InvalidTransition { allowed: Vec<IncidentStatus> },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("attachment rejected: {0}")]
    AttachmentRejected(String),
    #[error("forbidden")]
    Forbidden,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IncidentError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        match self {
            IncidentError::NotFound => ApiError::not_found("incident_not_found", trace_id),
            IncidentError::AssigneeNotInTenant => {
                ApiError::bad_request("assignee_not_in_tenant", trace_id)
            }
            IncidentError::InvalidTransition { allowed } => ApiError::InvalidTransition {
                allowed: allowed.into_iter().map(|s| s.as_str().to_string()).collect(),
                trace_id,
            },
            IncidentError::Validation(message) => ApiError::BadRequest {
                code: "invalid_incident",
                trace_id,
                message: Some(message),
            },
            IncidentError::AttachmentRejected(message) => ApiError::BadRequest {
                code: "attachment_rejected",
                trace_id,
                message: Some(message),
            },
            IncidentError::Forbidden => ApiError::Forbidden { trace_id },
            IncidentError::Database(err) => ApiError::internal(err, trace_id),
        }
    }
}
