//! # equeue-api
//!
//! HTTP surface of the clinic queue.
//!
//! Route groups are gated by business processes: a group answers 503 while
//! every process it names is disabled. Admin routes require the internal API
//! key. Live boards (reception, doctor cabinet, schedule) are Server-Sent
//! Event streams fed by the notification broker.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use equeue_core::defaults::CORS_MAX_AGE_SECS;
use equeue_core::{process, Broker};
use equeue_db::Database;

use crate::handlers::{admin, boards, doctor, registrar, tickets};
use crate::middleware::{require_api_key, require_process, ProcessGuard};
use crate::services::{DoctorBoard, ProcessGate, ScheduleBoard, TicketLifecycle};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub broker: Broker,
    pub gate: ProcessGate,
    pub lifecycle: TicketLifecycle,
    pub doctor_board: DoctorBoard,
    pub schedule_board: ScheduleBoard,
    /// Admin key; `None` rejects every admin request.
    pub api_key: Option<Arc<str>>,
    /// Flipped once on shutdown; live board streams end when it turns true.
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(db: Database, broker: Broker, gate: ProcessGate, api_key: Option<String>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            lifecycle: TicketLifecycle::new(db.clone()),
            doctor_board: DoctorBoard::new(db.clone(), broker.clone()),
            schedule_board: ScheduleBoard::new(db.clone()),
            db,
            broker,
            gate,
            api_key: api_key.map(Arc::from),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Ask every open board stream to finish so graceful shutdown can drain.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`AppState::begin_shutdown`] has been called.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            // An error means the sender is gone, which also ends the stream.
            let _ = rx.wait_for(|stopping| *stopping).await;
        }
    }
}

/// Request ID generator using UUIDv7 (time-ordered).
#[derive(Clone, Copy)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full application router.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let gated = |processes: &'static [&'static str]| {
        axum::middleware::from_fn_with_state(
            ProcessGuard::new(state.gate.clone(), processes),
            require_process,
        )
    };

    let reception = Router::new()
        .route("/tickets", get(boards::reception_updates))
        .route("/api/tickets/active", get(tickets::list_active))
        .route_layer(gated(&[process::RECEPTION]));

    let terminal = Router::new()
        .route("/api/tickets", post(tickets::create_ticket))
        .route("/api/tickets/services", get(tickets::list_services))
        .route(
            "/api/tickets/appointment/phone",
            post(tickets::check_in_by_phone),
        )
        .route_layer(gated(&[process::TERMINAL]));

    let registry = Router::new()
        .route("/api/registrar/call-next", post(registrar::call_next))
        .route("/api/registrar/call-specific", post(registrar::call_specific))
        .route("/api/registrar/tickets", get(registrar::list_tickets))
        .route(
            "/api/registrar/tickets/current",
            get(registrar::current_ticket),
        )
        .route(
            "/api/registrar/tickets/:id/status",
            patch(registrar::update_status),
        )
        .route("/api/registrar/services", get(registrar::list_services))
        .route(
            "/api/registrar/appointments",
            post(registrar::create_appointment),
        )
        .route(
            "/api/registrar/appointments/:id",
            delete(registrar::delete_appointment),
        )
        .route(
            "/api/registrar/appointments/:id/confirm",
            patch(registrar::confirm_appointment),
        )
        .route(
            "/api/registrar/patients/:id/appointments",
            get(registrar::patient_appointments),
        )
        .route(
            "/api/registrar/schedules/doctor/:id",
            get(registrar::doctor_schedule),
        )
        .route("/api/registrar/reports/daily", get(registrar::daily_report))
        .route(
            "/api/registrar/priorities",
            get(registrar::get_priorities).post(registrar::set_priorities),
        )
        .route_layer(gated(&[process::REGISTRY]));

    let doctor_directory = Router::new()
        .route("/api/doctor/active", get(doctor::list_doctors))
        .route("/api/doctor/cabinets/active", get(doctor::list_cabinets))
        .route_layer(gated(&[process::REGISTRY, process::QUEUE_DOCTOR]));

    let doctor_screen = Router::new()
        .route(
            "/api/doctor/screen-updates/:cabinet",
            get(boards::doctor_screen_updates),
        )
        .route_layer(gated(&[process::QUEUE_DOCTOR]));

    let doctor_workflow = Router::new()
        .route(
            "/api/doctor/tickets/registered",
            get(doctor::registered_tickets),
        )
        .route(
            "/api/doctor/tickets/in-progress",
            get(doctor::in_progress_tickets),
        )
        .route(
            "/api/doctor/start-appointment",
            post(doctor::start_appointment),
        )
        .route(
            "/api/doctor/complete-appointment",
            post(doctor::complete_appointment),
        )
        .route("/api/doctor/start-break", post(doctor::start_break))
        .route("/api/doctor/end-break", post(doctor::end_break))
        .route("/api/doctor/set-active", post(doctor::set_active))
        .route("/api/doctor/set-inactive", post(doctor::set_inactive))
        .route_layer(gated(&[process::DOCTOR]));

    let schedule = Router::new()
        .route("/api/schedules/today", get(boards::today_schedule))
        .route("/api/schedules/today/updates", get(boards::schedule_updates))
        .route_layer(gated(&[process::SCHEDULE]));

    let admin = Router::new()
        .route("/api/admin/processes", get(admin::list_processes))
        .route("/api/admin/processes/:name", patch(admin::update_process))
        .route("/api/admin/schedules", post(admin::create_schedule))
        .route("/api/admin/schedules/:id", delete(admin::delete_schedule))
        .route("/api/admin/tickets/:id", delete(admin::delete_ticket))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/processes/:name", get(admin::process_status))
        .merge(reception)
        .merge(terminal)
        .merge(registry)
        .merge(doctor_directory)
        .merge(doctor_screen)
        .merge(doctor_workflow)
        .merge(schedule)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// CORS policy: whitelist with credentials, or any origin when no list is set.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let max_age = Duration::from_secs(CORS_MAX_AGE_SECS);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(subsystem = "api", origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(max_age);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(middleware::api_key::API_KEY_HEADER),
        ])
        .allow_credentials(true)
        .max_age(max_age)
}
