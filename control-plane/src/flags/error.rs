use common_http_errors::ApiError;
use uuid::Uuid;

use super::grammar::RuleValidationError;

#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("flag not found")]
    NotFound,
    #[error("a flag with this key already exists in this environment")]
    Duplicate,
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleValidationError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("forbidden")]
    Forbidden,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl FlagError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        match self {
            FlagError::NotFound => ApiError::not_found("flag_not_found", trace_id),
            FlagError::Duplicate => {
                ApiError::Conflict { code: "flag_already_exists", trace_id, message: None }
            }
            FlagError::InvalidRule(err) => ApiError::BadRequest {
                code: "invalid_rule",
                trace_id,
                message: Some(err.to_string()),
            },
            FlagError::Validation(message) => ApiError::BadRequest {
                code: "invalid_flag",
                trace_id,
                message: Some(message),
            },
            FlagError::Forbidden => ApiError::Forbidden { trace_id },
            FlagError::Database(err) => ApiError::internal(err, trace_id),
        }
    }
}
