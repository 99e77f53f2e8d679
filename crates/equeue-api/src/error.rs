//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Message returned when a request hits a disabled business process.
pub const PROCESS_DISABLED_MESSAGE: &str =
    "This service is temporarily disabled by the administrator.";

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("internal error: {0}")]
    Internal(equeue_core::Error),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl From<equeue_core::Error> for ApiError {
    fn from(err: equeue_core::Error) -> Self {
        use equeue_core::Error;

        if err.is_not_found() {
            return ApiError::NotFound(err.to_string());
        }
        if err.is_conflict() {
            return ApiError::Conflict(err.to_string());
        }
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::UnknownService(_) | Error::Serialization(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                "Internal server error".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
