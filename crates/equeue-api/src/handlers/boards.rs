//! Live boards over Server-Sent Events.
//!
//! Each connection owns one broker [`Subscription`]. The stream holds it, so
//! when the client goes away axum drops the stream and the subscription
//! unsubscribes itself. Doctor and schedule boards resend their full state on
//! every relevant notification. All board streams end once the server
//! starts shutting down.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream};
use futures::StreamExt as _;
use serde::Serialize;
use tracing::{error, info};

use equeue_core::defaults::SSE_KEEPALIVE_SECS;
use equeue_core::{Notification, Subscription};

use crate::error::ApiError;
use crate::AppState;

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
        .text("keepalive")
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().event(name).data(json),
        Err(e) => error_event(&e.to_string()),
    }
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::json!({ "error": message }).to_string())
}

/// Wait for the next notification accepted by `relevant`.
///
/// Returns false once the subscription is closed.
async fn next_relevant(
    subscription: &mut Subscription,
    relevant: fn(&Notification) -> bool,
) -> bool {
    while let Some(notification) = subscription.recv().await {
        if relevant(&notification) {
            return true;
        }
    }
    false
}

fn affects_doctor_board(notification: &Notification) -> bool {
    !matches!(notification, Notification::Unknown(_))
}

fn affects_schedule_board(notification: &Notification) -> bool {
    matches!(notification, Notification::Schedule { .. })
}

// =============================================================================
// Reception board
// =============================================================================

/// Ticket changes as they happen: event name is the row action, data the ticket.
pub async fn reception_updates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broker.subscribe();
    info!(
        subsystem = "api",
        component = "boards",
        board = "reception",
        subscriber_id = subscription.id(),
        "Board connected"
    );

    let stream = tokio_stream::StreamExt::filter_map(subscription, |notification| {
        match notification {
            Notification::Ticket { action, ticket } => Some(Ok(json_event(&action, &ticket))),
            _ => None,
        }
    });

    Sse::new(stream.take_until(state.shutdown_requested())).keep_alive(keep_alive())
}

// =============================================================================
// Doctor board
// =============================================================================

/// Cabinet board: `state_update` on connect and after every change.
pub async fn doctor_screen_updates(
    State(state): State<AppState>,
    Path(cabinet): Path<i32>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broker.subscribe();
    info!(
        subsystem = "api",
        component = "boards",
        board = "doctor",
        cabinet,
        subscriber_id = subscription.id(),
        "Board connected"
    );

    let board = state.doctor_board.clone();
    let stream = stream::unfold(Some((subscription, true)), move |live| {
        let board = board.clone();
        async move {
            let (mut subscription, first) = live?;
            if !first && !next_relevant(&mut subscription, affects_doctor_board).await {
                return None;
            }
            match board.screen_state(cabinet).await {
                Ok(screen) => Some((
                    Ok(json_event("state_update", &screen)),
                    Some((subscription, false)),
                )),
                Err(e) => {
                    error!(
                        subsystem = "api",
                        component = "boards",
                        board = "doctor",
                        cabinet,
                        error = %e,
                        "Failed to build doctor board state"
                    );
                    Some((Ok(error_event(&e.to_string())), None))
                }
            }
        }
    });

    Sse::new(stream.take_until(state.shutdown_requested())).keep_alive(keep_alive())
}

// =============================================================================
// Schedule board
// =============================================================================

pub async fn today_schedule(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.schedule_board.today().await?))
}

/// Schedule board: `schedule_initial` on connect, `schedule_update` after
/// every schedule change.
pub async fn schedule_updates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broker.subscribe();
    info!(
        subsystem = "api",
        component = "boards",
        board = "schedule",
        subscriber_id = subscription.id(),
        "Board connected"
    );

    let board = state.schedule_board.clone();
    let stream = stream::unfold(Some((subscription, true)), move |live| {
        let board = board.clone();
        async move {
            let (mut subscription, first) = live?;
            if !first && !next_relevant(&mut subscription, affects_schedule_board).await {
                return None;
            }
            let name = if first { "schedule_initial" } else { "schedule_update" };
            match board.today().await {
                Ok(snapshot) => Some((
                    Ok(json_event(name, &snapshot)),
                    Some((subscription, false)),
                )),
                Err(e) => {
                    error!(
                        subsystem = "api",
                        component = "boards",
                        board = "schedule",
                        error = %e,
                        "Failed to build schedule snapshot"
                    );
                    Some((Ok(error_event(&e.to_string())), None))
                }
            }
        }
    });

    Sse::new(stream.take_until(state.shutdown_requested())).keep_alive(keep_alive())
}
