//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

impl From<crate::domain::primitives::PrimitiveError> for AppError {
    fn from(e: crate::domain::primitives::PrimitiveError) -> Self {
        AppError::Domain(e.into())
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 400 Bad Request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // 401 Unauthorized
    #[error("Invalid or missing credential")]
    Unauthenticated,

    // 403 Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Permission denied")]
    PermissionDenied,

    // 404 Not Found
    #[error("Not found: {0}")]
    NotFound(String),

    // 409 Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    // 429 Too Many Requests
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    // 400, but distinguished at the handler level so the message always
    // names the violated business rule.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors bridge in and are re-mapped by kind below.
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // 503, surfaced once the store's retry budget is exhausted.
    #[error("Storage temporarily unavailable")]
    Transient,

    // 500 Internal Server Error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::BusinessRule(_) => (StatusCode::BAD_REQUEST, "business_rule"),
            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),

            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::EventNotFound(_) | DomainError::UserNotFound(_) => {
                        (StatusCode::NOT_FOUND, "not_found")
                    }
                    DomainError::RegistrationNotFound => (StatusCode::NOT_FOUND, "not_registered"),
                    DomainError::EventFull => (StatusCode::BAD_REQUEST, "event_full"),
                    DomainError::EventPast => (StatusCode::BAD_REQUEST, "event_past"),
                    DomainError::AlreadyRegistered => {
                        (StatusCode::BAD_REQUEST, "already_registered")
                    }
                    // Cancelling someone else's registration reports as a bad
                    // request rather than the generic 403 used for event-edit
                    // forbidden; kept as its own variant so the distinct
                    // status code and message survive.
                    DomainError::ForbiddenCancel => (StatusCode::BAD_REQUEST, "forbidden_cancel"),
                    DomainError::ForbiddenEventEdit => (StatusCode::FORBIDDEN, "forbidden"),
                    DomainError::SchedulingConflict { .. } => {
                        (StatusCode::CONFLICT, "scheduling_conflict")
                    }
                    DomainError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                    DomainError::CapacityBelowCurrent { .. } => {
                        (StatusCode::BAD_REQUEST, "capacity_below_current")
                    }
                    DomainError::ConcurrencyConflict => {
                        (StatusCode::SERVICE_UNAVAILABLE, "concurrency_conflict")
                    }
                }
            }

            AppError::Transient => (StatusCode::SERVICE_UNAVAILABLE, "transient"),

            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
            }
        };

        // 5xx messages never carry the underlying storage/internal detail:
        // that goes to the log line above instead, so the envelope can't
        // leak stack detail regardless of environment.
        let message = match &self {
            AppError::Database(_) => "a storage error occurred".to_string(),
            AppError::Internal(_) => "an internal error occurred".to_string(),
            AppError::Config(_) => "a configuration error occurred".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorResponse {
            success: false,
            message,
            error_code: Some(error_code.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
