//! Admin and process-status endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use equeue_core::CreateScheduleRequest;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProcessBody {
    pub is_enabled: bool,
}

/// Public status of one process, for clients deciding what to show.
pub async fn process_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gate.get(&name).await?))
}

pub async fn list_processes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gate.get_all().await?))
}

pub async fn update_process(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<UpdateProcessBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gate.update_status(&name, body.is_enabled).await?))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slot = state.schedule_board.create_slot(body).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.schedule_board.delete_slot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.lifecycle.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
