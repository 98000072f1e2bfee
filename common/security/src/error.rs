use common_http_errors::ApiError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("missing tenant identifier")]
    MissingTenant,
    #[error("mismatched tenant context")]
    MismatchedTenant,
    #[error("unauthorized - missing required role")]
    Forbidden,
    #[error("invalid authorization token")]
    InvalidToken,
    #[error("internal security error")]
    Internal,
}

impl SecurityError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        match self {
            SecurityError::MissingTenant => ApiError::bad_request("missing_tenant", trace_id),
            SecurityError::MismatchedTenant => ApiError::Unauthorized { trace_id },
            SecurityError::Forbidden => ApiError::Forbidden { trace_id },
            SecurityError::InvalidToken => ApiError::Unauthorized { trace_id },
            SecurityError::Internal => ApiError::internal("security check failed", trace_id),
        }
    }
}
