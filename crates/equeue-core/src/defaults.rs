//! Centralized default constants for equeue.
//!
//! Every crate references these instead of defining its own magic numbers.

// =============================================================================
// TICKETS
// =============================================================================

/// Ticket suffixes run 1..=999; allocating the ceiling wraps back to 1.
pub const TICKET_NUMBER_CEILING: i32 = 1000;

/// Width of the zero-padded numeric suffix (`A001`).
pub const TICKET_NUMBER_WIDTH: usize = 3;

/// Service tag used for tickets issued by phone check-in.
pub const CONFIRM_APPOINTMENT_SERVICE: &str = "confirm_appointment";

/// Appointments starting within this many minutes rank just behind overdue ones.
pub const CALL_SOON_WINDOW_MINUTES: i32 = 5;

// =============================================================================
// BROKER / LIVE BOARDS
// =============================================================================

/// Per-subscriber queue capacity in the notification broker.
pub const SUBSCRIBER_CAPACITY: usize = 10;

/// SSE keep-alive interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

/// Change feed channel carrying ticket row changes.
pub const TICKET_CHANNEL: &str = "ticket_update";

/// Change feed channel carrying schedule row changes.
pub const SCHEDULE_CHANNEL: &str = "schedule_update";

/// Fixed delay before the listener retries after a connection error.
pub const LISTENER_RETRY_SECS: u64 = 5;

// =============================================================================
// BOARDS
// =============================================================================

/// Board window start when no slots exist today.
pub const SCHEDULE_DEFAULT_START: &str = "09:00:00";

/// Board window end when no slots exist today.
pub const SCHEDULE_DEFAULT_END: &str = "18:00:00";

/// Placeholder shown on the doctor board when an appointment has no patient.
pub const UNKNOWN_PATIENT_LABEL: &str = "Patient not specified";

/// Message shown on a cabinet board with no slots today.
pub const NO_RECEPTION_MESSAGE: &str = "No reception scheduled in this cabinet today";

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Default daily maintenance time (`HH:MM`, local time).
pub const MAINTENANCE_TIME: &str = "00:00";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP port.
pub const BACKEND_PORT: u16 = 8080;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;
