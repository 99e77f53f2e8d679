//! Registrar desk endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use equeue_core::{
    AppointmentRepository, CreateAppointmentRequest, RegistrarPriorityRepository, StatusUpdate,
    TicketStatus,
};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallNextBody {
    pub window_number: i32,
    #[serde(default)]
    pub category_prefix: Option<String>,
    #[serde(default)]
    pub registrar_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CallSpecificBody {
    pub ticket_id: i64,
    pub window_number: i32,
}

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub category: Option<String>,
    pub registrar_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub window_number: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub ticket_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RegistrarQuery {
    pub registrar_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetPrioritiesBody {
    pub registrar_id: i64,
    pub service_ids: Vec<i64>,
}

// =============================================================================
// Queue
// =============================================================================

pub async fn call_next(
    State(state): State<AppState>,
    Json(body): Json<CallNextBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .lifecycle
        .call_next(
            body.window_number,
            body.category_prefix.as_deref(),
            body.registrar_id,
        )
        .await?;
    Ok(Json(ticket))
}

pub async fn call_specific(
    State(state): State<AppState>,
    Json(body): Json<CallSpecificBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .lifecycle
        .call_specific(body.ticket_id, body.window_number)
        .await?;
    Ok(Json(ticket))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tickets = state
        .lifecycle
        .list_for_registrar(query.category.as_deref(), query.registrar_id)
        .await?;
    Ok(Json(tickets))
}

/// The ticket invited to a window; 404 when the window is idle.
pub async fn current_ticket(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .lifecycle
        .invited_for_window(query.window_number)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No active ticket for window {}",
                query.window_number
            ))
        })?;
    Ok(Json(ticket))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let status: TicketStatus = body.status.parse()?;
    let outcome = state.lifecycle.update_status(id, status).await?;
    let applied = outcome.was_applied();
    let ticket = match outcome {
        StatusUpdate::Applied(t) | StatusUpdate::Ignored(t) => t,
    };
    Ok(Json(serde_json::json!({
        "applied": applied,
        "ticket": ticket,
    })))
}

pub async fn daily_report(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.daily_report().await?))
}

pub async fn list_services(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.services().await?))
}

// =============================================================================
// Appointments
// =============================================================================

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let appointment = state.db.appointments.create(body).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.appointments.delete_and_free_slot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ConfirmBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .lifecycle
        .confirm_appointment(id, body.ticket_id)
        .await?;
    Ok(Json(ticket))
}

pub async fn patient_appointments(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.appointments.list_for_patient(patient_id).await?))
}

/// A doctor's slots for `?date=` (default today) with bookings.
pub async fn doctor_schedule(
    State(state): State<AppState>,
    Path(doctor_id): Path<i64>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    Ok(Json(state.schedule_board.doctor_day(doctor_id, date).await?))
}

// =============================================================================
// Priorities
// =============================================================================

pub async fn get_priorities(
    State(state): State<AppState>,
    Query(query): Query<RegistrarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.priorities.get(query.registrar_id).await?))
}

pub async fn set_priorities(
    State(state): State<AppState>,
    Json(body): Json<SetPrioritiesBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .priorities
        .set(body.registrar_id, &body.service_ids)
        .await?;
    Ok(Json(state.db.priorities.get(body.registrar_id).await?))
}
