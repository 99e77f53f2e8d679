//! Error types for equeue.

use thiserror::Error;

use crate::models::TicketStatus;

/// Result type alias using equeue's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for equeue operations.
///
/// Variants are grouped the way callers need to react to them: not-found
/// conditions, precondition/conflict conditions, validation failures and
/// infrastructure failures. The HTTP layer maps each group to a status code.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ticket not found
    #[error("Ticket not found: {0}")]
    TicketNotFound(i64),

    /// Appointment not found
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(i64),

    /// Schedule slot not found
    #[error("Schedule slot not found: {0}")]
    ScheduleNotFound(i64),

    /// Doctor not found
    #[error("Doctor not found: {0}")]
    DoctorNotFound(i64),

    /// No patient is registered under the given (normalized) phone number
    #[error("Patient not found for phone {0}")]
    PatientNotFound(String),

    /// Patient exists but has no ticketless appointment today
    #[error("No upcoming appointment for today")]
    NoUpcomingAppointment,

    /// CallNext found nothing eligible
    #[error("Queue is empty")]
    QueueEmpty,

    /// Ticket is in the wrong status for the requested transition
    #[error("Ticket {ticket_id} has status '{status}', transition not allowed")]
    InvalidTransition { ticket_id: i64, status: TicketStatus },

    /// Doctor is in the wrong status for the requested break/login action
    #[error("Doctor status conflict: {0}")]
    DoctorStatusConflict(String),

    /// Schedule slot already booked
    #[error("Schedule slot {0} is already taken")]
    SlotTaken(i64),

    /// Appointment already bound to a ticket
    #[error("Appointment {0} already has a ticket")]
    AppointmentHasTicket(i64),

    /// Unknown service tag on ticket creation
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Unknown business process name
    #[error("Business process not found: {0}")]
    ProcessNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic conflict (unique constraint and the like)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every "entity absent" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::TicketNotFound(_)
                | Error::AppointmentNotFound(_)
                | Error::ScheduleNotFound(_)
                | Error::DoctorNotFound(_)
                | Error::PatientNotFound(_)
                | Error::NoUpcomingAppointment
                | Error::ProcessNotFound(_)
        )
    }

    /// True for precondition failures that leave state untouched.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::QueueEmpty
                | Error::InvalidTransition { .. }
                | Error::DoctorStatusConflict(_)
                | Error::SlotTaken(_)
                | Error::AppointmentHasTicket(_)
                | Error::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_ticket_not_found() {
        let err = Error::TicketNotFound(42);
        assert_eq!(err.to_string(), "Ticket not found: 42");
    }

    #[test]
    fn test_invalid_transition_names_status() {
        let err = Error::InvalidTransition {
            ticket_id: 7,
            status: TicketStatus::Invited,
        };
        assert_eq!(
            err.to_string(),
            "Ticket 7 has status 'invited', transition not allowed"
        );
    }

    #[test]
    fn test_error_display_slot_taken() {
        let err = Error::SlotTaken(3);
        assert_eq!(err.to_string(), "Schedule slot 3 is already taken");
    }

    #[test]
    fn test_patient_and_appointment_signals_are_distinct() {
        let patient = Error::PatientNotFound("79990001122".to_string());
        let appointment = Error::NoUpcomingAppointment;
        assert!(patient.is_not_found());
        assert!(appointment.is_not_found());
        assert_ne!(patient.to_string(), appointment.to_string());
    }

    #[test]
    fn test_not_found_and_conflict_are_disjoint() {
        let errors = vec![
            Error::NotFound("x".into()),
            Error::TicketNotFound(1),
            Error::AppointmentNotFound(1),
            Error::ScheduleNotFound(1),
            Error::DoctorNotFound(1),
            Error::QueueEmpty,
            Error::SlotTaken(1),
            Error::AppointmentHasTicket(1),
            Error::Conflict("dup".into()),
        ];
        for err in errors {
            assert!(
                !(err.is_not_found() && err.is_conflict()),
                "{err} classified twice"
            );
        }
    }

    #[test]
    fn test_validation_errors_are_neither() {
        let err = Error::InvalidInput("window_number must be positive".into());
        assert!(!err.is_not_found());
        assert!(!err.is_conflict());
        let err = Error::UnknownService("xray".into());
        assert!(!err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
