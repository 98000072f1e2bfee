use std::sync::OnceLock;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

static REDACT_INTERNAL_MESSAGES: OnceLock<bool> = OnceLock::new();

/// Sets whether `ApiError::Internal`'s message is redacted in responses.
/// Call once at startup from the environment's production/development
/// flag; defaults to not redacting (development-friendly) if never called.
/// Only the first call takes effect.
pub fn configure_redaction(redact: bool) {
    let _ = REDACT_INTERNAL_MESSAGES.set(redact);
}

fn redacting() -> bool {
    *REDACT_INTERNAL_MESSAGES.get().unwrap_or(&false)
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_transitions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<i64>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized { trace_id: Option<Uuid> },
    ForbiddenMissingRole { role: &'static str, trace_id: Option<Uuid> },
    Forbidden { trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    InvalidTransition { allowed: Vec<String>, trace_id: Option<Uuid> },
    RateLimited { remaining: u32, reset_at: i64, trace_id: Option<Uuid> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }

    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }

    pub fn not_found(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::NotFound { code, trace_id }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let empty_body = |code: String, trace_id: Option<Uuid>| ErrorBody {
            code,
            missing_role: None,
            trace_id,
            message: None,
            allowed_transitions: None,
            remaining: None,
            reset_at: None,
        };

        let (status, body, error_code) = match self {
            ApiError::Unauthorized { trace_id } => (
                StatusCode::UNAUTHORIZED,
                empty_body("unauthorized".into(), trace_id),
                "unauthorized",
            ),
            ApiError::ForbiddenMissingRole { role, trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { missing_role: Some(role.into()), ..empty_body("missing_role".into(), trace_id) },
                "missing_role",
            ),
            ApiError::Forbidden { trace_id } => (
                StatusCode::FORBIDDEN,
                empty_body("forbidden".into(), trace_id),
                "forbidden",
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { message, ..empty_body(code.into(), trace_id) },
                code,
            ),
            ApiError::NotFound { code, trace_id } => (
                StatusCode::NOT_FOUND,
                empty_body(code.into(), trace_id),
                code,
            ),
            ApiError::Conflict { code, trace_id, message } => (
                StatusCode::CONFLICT,
                ErrorBody { message, ..empty_body(code.into(), trace_id) },
                code,
            ),
            ApiError::InvalidTransition { allowed, trace_id } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message: Some("incident cannot transition to the requested status".into()),
                    allowed_transitions: Some(allowed),
                    ..empty_body("invalid_transition".into(), trace_id)
                },
                "invalid_transition",
            ),
            ApiError::RateLimited { remaining, reset_at, trace_id } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    remaining: Some(remaining),
                    reset_at: Some(reset_at),
                    ..empty_body("rate_limited".into(), trace_id)
                },
                "rate_limited",
            ),
            ApiError::Internal { trace_id, message } => {
                let message = if redacting() { None } else { message };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody { message, ..empty_body("internal_error".into(), trace_id) },
                    "internal_error",
                )
            }
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
