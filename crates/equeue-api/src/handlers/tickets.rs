//! Terminal and reception endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub service_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneCheckInBody {
    pub phone: String,
}

/// Services offered at the terminal.
pub async fn list_services(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.services().await?))
}

pub async fn create_ticket(
    State(state): State<AppState>,
    Json(body): Json<CreateTicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.lifecycle.create(body.service_id.trim()).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn check_in_by_phone(
    State(state): State<AppState>,
    Json(body): Json<PhoneCheckInBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.lifecycle.check_in_by_phone(&body.phone).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Waiting and invited tickets for the reception board.
pub async fn list_active(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.list_active().await?))
}
