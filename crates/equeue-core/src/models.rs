//! Domain models for the clinic queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::{TICKET_NUMBER_CEILING, TICKET_NUMBER_WIDTH};
use crate::error::{Error, Result};

// =============================================================================
// TICKET STATUS
// =============================================================================

/// Lifecycle state of a ticket.
///
/// ```text
/// waiting ──call──▶ invited ──confirm──▶ registered ──start──▶ in_progress ──complete──▶ completed
///    └──────────────confirm──────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Waiting,
    Invited,
    Registered,
    InProgress,
    Completed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Invited => "invited",
            TicketStatus::Registered => "registered",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == TicketStatus::Completed
    }

    /// Transitions performed by the dedicated lifecycle operations
    /// (call, confirm, start, complete).
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Waiting, Invited)
                | (Waiting, Registered)
                | (Invited, Registered)
                | (Registered, InProgress)
                | (InProgress, Completed)
        )
    }

    /// A registrar-side "completed" arriving after the ticket already moved
    /// into the doctor's queue. The generic update path drops it silently.
    pub fn is_stale_completion(current: TicketStatus, requested: TicketStatus) -> bool {
        current == TicketStatus::Registered && requested == TicketStatus::Completed
    }

    /// Requests that must be checked against the persisted status before applying.
    pub fn needs_fresh_read(self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Registered)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(TicketStatus::Waiting),
            "invited" => Ok(TicketStatus::Invited),
            "registered" => Ok(TicketStatus::Registered),
            "in_progress" => Ok(TicketStatus::InProgress),
            "completed" => Ok(TicketStatus::Completed),
            other => Err(Error::InvalidInput(format!("unknown ticket status '{other}'"))),
        }
    }
}

// =============================================================================
// DOCTOR STATUS
// =============================================================================

/// Presence state of a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoctorStatus {
    Active,
    Inactive,
    OnBreak,
}

/// Explicit actions that change a doctor's status. Nothing else does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorAction {
    StartBreak,
    EndBreak,
    LogIn,
    LogOut,
}

impl DoctorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DoctorStatus::Active => "active",
            DoctorStatus::Inactive => "inactive",
            DoctorStatus::OnBreak => "on_break",
        }
    }

    /// Resulting status, or `None` when the action is not allowed from `self`.
    pub fn apply(self, action: DoctorAction) -> Option<DoctorStatus> {
        match (self, action) {
            (DoctorStatus::Active, DoctorAction::StartBreak) => Some(DoctorStatus::OnBreak),
            (DoctorStatus::OnBreak, DoctorAction::EndBreak) => Some(DoctorStatus::Active),
            (_, DoctorAction::LogIn) => Some(DoctorStatus::Active),
            (_, DoctorAction::LogOut) => Some(DoctorStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoctorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(DoctorStatus::Active),
            "inactive" => Ok(DoctorStatus::Inactive),
            "on_break" => Ok(DoctorStatus::OnBreak),
            other => Err(Error::InvalidInput(format!("unknown doctor status '{other}'"))),
        }
    }
}

// =============================================================================
// TICKET NUMBERS
// =============================================================================

/// Suffix following `max_suffix` for a prefix, wrapping to 1 at the ceiling.
pub fn next_ticket_suffix(max_suffix: i32) -> i32 {
    let next = max_suffix + 1;
    if next >= TICKET_NUMBER_CEILING {
        1
    } else {
        next
    }
}

/// `("A", 7)` → `"A007"`.
pub fn format_ticket_number(letter: &str, suffix: i32) -> String {
    format!("{letter}{suffix:0width$}", width = TICKET_NUMBER_WIDTH)
}

/// Keep digits only: `"+7 (999) 000-11-22"` → `"79990001122"`.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A queue position issued to one visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_number: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Letter prefix of the ticket number.
    pub fn prefix(&self) -> &str {
        self.ticket_number
            .char_indices()
            .nth(1)
            .map(|(i, _)| &self.ticket_number[..i])
            .unwrap_or(&self.ticket_number)
    }
}

/// A service offered at the terminal; its letter prefixes ticket numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub service_id: String,
    #[serde(rename = "title")]
    pub name: String,
    pub letter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub full_name: String,
    pub specialization: String,
    pub status: DoctorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A doctor's bookable interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabinet: Option<i32>,
}

/// Binds a slot to a patient and, after check-in, to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub schedule_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Timing record of one registrar-window call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionLog {
    pub id: i64,
    pub ticket_id: i64,
    pub registrar_id: Option<i64>,
    pub window_number: i32,
    pub called_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

/// Named on/off switch gating an API surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProcess {
    pub process_name: String,
    pub is_enabled: bool,
}

/// Well-known business process names.
pub mod process {
    pub const RECEPTION: &str = "reception";
    pub const QUEUE_DOCTOR: &str = "queue_doctor";
    pub const TERMINAL: &str = "terminal";
    pub const REGISTRY: &str = "registry";
    pub const DOCTOR: &str = "doctor";
    pub const DATABASE: &str = "database";
    pub const SCHEDULE: &str = "schedule";

    pub const ALL: [&str; 7] = [
        RECEPTION,
        QUEUE_DOCTOR,
        TERMINAL,
        REGISTRY,
        DOCTOR,
        DATABASE,
        SCHEDULE,
    ];
}

// =============================================================================
// READ MODELS
// =============================================================================

/// Outcome of the generic registrar status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Applied(Ticket),
    /// Stale completion against a registered ticket; the ticket is returned unchanged.
    Ignored(Ticket),
}

impl StatusUpdate {
    pub fn ticket(&self) -> &Ticket {
        match self {
            StatusUpdate::Applied(t) | StatusUpdate::Ignored(t) => t,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, StatusUpdate::Applied(_))
    }
}

/// Ticket row for the registrar list, with the linked appointment time.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrarTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
}

/// One entry of a cabinet queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorQueueEntry {
    pub start_time: String,
    pub ticket_number: String,
    pub patient_full_name: String,
    pub status: TicketStatus,
}

/// Earliest slot of the day for a cabinet, with its doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetSlot {
    pub schedule: Schedule,
    pub doctor: Doctor,
}

/// Full state rendered on a per-cabinet doctor board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorScreenState {
    pub doctor_name: String,
    pub doctor_specialty: String,
    pub cabinet_number: i32,
    pub queue: Vec<DoctorQueueEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub doctor_status: DoctorStatus,
}

impl DoctorScreenState {
    /// State for a cabinet with no slots today.
    pub fn empty(cabinet_number: i32, message: impl Into<String>) -> Self {
        Self {
            doctor_name: String::new(),
            doctor_specialty: String::new(),
            cabinet_number,
            queue: Vec::new(),
            message: Some(message.into()),
            doctor_status: DoctorStatus::Inactive,
        }
    }
}

/// One slot on the schedule board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabinet: Option<i32>,
}

/// A doctor with their slots for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorSlots {
    pub id: i64,
    pub full_name: String,
    pub specialization: String,
    pub slots: Vec<SlotView>,
}

/// Schedule board snapshot for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodaySchedule {
    pub date: String,
    pub min_start_time: String,
    pub max_end_time: String,
    pub doctors: Vec<DoctorSlots>,
}

/// Slot joined with its doctor, as read for the schedule board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorSlotRow {
    pub doctor: Doctor,
    pub schedule: Schedule,
}

/// Slot with its booking, for the registrar's day planner.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWithAppointment {
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
}

/// A patient's appointment with slot and doctor details.
#[derive(Debug, Clone, Serialize)]
pub struct PatientAppointment {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub schedule: Schedule,
    pub doctor_name: String,
    pub doctor_specialization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
}

/// One line of the registrar's daily report.
#[derive(Debug, Clone, Serialize)]
pub struct DailyReportRow {
    pub ticket_number: String,
    pub doctor_full_name: Option<String>,
    pub doctor_specialization: Option<String>,
    pub cabinet_number: Option<i32>,
    pub appointment_time: Option<String>,
    pub status: TicketStatus,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<String>,
}

/// Row counts removed by the daily cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub appointments_deleted: u64,
    pub tickets_deleted: u64,
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: Option<bool>,
    pub cabinet: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub schedule_id: i64,
    pub patient_id: Option<i64>,
}
