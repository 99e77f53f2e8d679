//! Doctor workstation endpoints.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use equeue_core::DoctorAction;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DoctorFilter {
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TicketBody {
    pub ticket_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DoctorBody {
    pub doctor_id: i64,
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.doctor_board.list_doctors().await?))
}

pub async fn list_cabinets(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.doctor_board.list_cabinets().await?))
}

pub async fn registered_tickets(
    State(state): State<AppState>,
    Query(filter): Query<DoctorFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state.doctor_board.registered_tickets(filter.doctor_id).await?,
    ))
}

pub async fn in_progress_tickets(
    State(state): State<AppState>,
    Query(filter): Query<DoctorFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state.doctor_board.in_progress_tickets(filter.doctor_id).await?,
    ))
}

pub async fn start_appointment(
    State(state): State<AppState>,
    Json(body): Json<TicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.start_appointment(body.ticket_id).await?))
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    Json(body): Json<TicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        state.lifecycle.complete_appointment(body.ticket_id).await?,
    ))
}

async fn apply(
    state: &AppState,
    doctor_id: i64,
    action: DoctorAction,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.doctor_board.apply(doctor_id, action).await?))
}

pub async fn start_break(
    State(state): State<AppState>,
    Json(body): Json<DoctorBody>,
) -> Result<impl IntoResponse, ApiError> {
    apply(&state, body.doctor_id, DoctorAction::StartBreak).await
}

pub async fn end_break(
    State(state): State<AppState>,
    Json(body): Json<DoctorBody>,
) -> Result<impl IntoResponse, ApiError> {
    apply(&state, body.doctor_id, DoctorAction::EndBreak).await
}

pub async fn set_active(
    State(state): State<AppState>,
    Json(body): Json<DoctorBody>,
) -> Result<impl IntoResponse, ApiError> {
    apply(&state, body.doctor_id, DoctorAction::LogIn).await
}

pub async fn set_inactive(
    State(state): State<AppState>,
    Json(body): Json<DoctorBody>,
) -> Result<impl IntoResponse, ApiError> {
    apply(&state, body.doctor_id, DoctorAction::LogOut).await
}
