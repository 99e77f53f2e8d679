//! Shared-secret check for the admin API.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the internal API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests without the configured `X-API-Key`.
///
/// A missing header is 401, a wrong key 403. With no key configured the
/// admin API is closed.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        warn!(
            subsystem = "api",
            component = "api_key",
            "Admin request rejected, INTERNAL_API_KEY is not configured"
        );
        return ApiError::Forbidden("Admin API is disabled".to_string()).into_response();
    };

    let rejection = match request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        None | Some("") => Some(ApiError::Unauthorized("API key is missing".to_string())),
        Some(provided) if provided != expected => {
            Some(ApiError::Forbidden("Invalid API key".to_string()))
        }
        Some(_) => None,
    };

    match rejection {
        Some(err) => err.into_response(),
        None => next.run(request).await,
    }
}
