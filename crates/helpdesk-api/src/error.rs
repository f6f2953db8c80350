//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.
//! Internal details are logged and never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use helpdesk_core::error::HelpdeskError;
use helpdesk_engine::SupportError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - a required field is absent or blank.
    MissingField(&'static str),
    /// 400 Bad Request - invalid parameters or body.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - the session no longer accepts messages.
    Conflict(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Missing required fields".to_string(),
                Some(serde_json::json!({ "field": field })),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SupportError> for ApiError {
    fn from(err: SupportError) -> Self {
        match err {
            SupportError::MissingField(field) => ApiError::MissingField(field),
            SupportError::MessageTooLong(_) => ApiError::BadRequest(err.to_string()),
            SupportError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            SupportError::SessionClosed { .. } => ApiError::Conflict(err.to_string()),
            SupportError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<HelpdeskError> for ApiError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::NotFound(msg) => ApiError::NotFound(msg),
            HelpdeskError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
