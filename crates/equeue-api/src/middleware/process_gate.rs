//! Business-process gating for route groups.
//!
//! A route group names the processes that serve it. The request passes if any
//! of them is enabled; otherwise it is answered with 503 without reaching the
//! handler.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::{ApiError, PROCESS_DISABLED_MESSAGE};
use crate::services::ProcessGate;

/// Middleware state: the gate plus the processes a route group needs.
#[derive(Clone)]
pub struct ProcessGuard {
    gate: ProcessGate,
    processes: &'static [&'static str],
}

impl ProcessGuard {
    pub fn new(gate: ProcessGate, processes: &'static [&'static str]) -> Self {
        Self { gate, processes }
    }
}

pub async fn require_process(
    State(guard): State<ProcessGuard>,
    request: Request,
    next: Next,
) -> Response {
    if guard.gate.any_enabled(guard.processes).await {
        return next.run(request).await;
    }

    debug!(
        subsystem = "api",
        component = "process_gate",
        processes = ?guard.processes,
        path = %request.uri().path(),
        "Request rejected, process disabled"
    );
    ApiError::ServiceUnavailable(PROCESS_DISABLED_MESSAGE.to_string()).into_response()
}
