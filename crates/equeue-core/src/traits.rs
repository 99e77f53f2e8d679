//! Repository traits for the persistent store.
//!
//! Pool-level reads and single-statement writes live here. Multi-step
//! mutations that must commit together are composed by the services from the
//! `_tx` methods on the concrete PostgreSQL repositories.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::Result;
use crate::models::*;

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Ticket>>;

    async fn get_by_number(&self, ticket_number: &str) -> Result<Option<Ticket>>;

    /// Tickets in any of `statuses`, oldest first.
    async fn list_by_statuses(&self, statuses: &[TicketStatus]) -> Result<Vec<Ticket>>;

    /// Registrar list: tickets in `statuses` whose letter is in `prefixes`
    /// (empty = all), newest first, with the linked appointment time.
    async fn list_for_registrar(
        &self,
        statuses: &[TicketStatus],
        prefixes: &[String],
    ) -> Result<Vec<RegistrarTicket>>;

    /// The ticket currently invited to `window_number`, if any.
    async fn find_invited_for_window(&self, window_number: i32) -> Result<Option<Ticket>>;

    /// Tickets in `status` linked to a slot, optionally for one doctor, by slot start.
    async fn list_for_doctor(
        &self,
        status: TicketStatus,
        doctor_id: Option<i64>,
    ) -> Result<Vec<Ticket>>;

    /// Queue for one cabinet on `date`: in-progress first, then by slot start.
    async fn cabinet_queue(&self, cabinet: i32, date: NaiveDate) -> Result<Vec<DoctorQueueEntry>>;

    /// All tickets created on `date` with doctor/slot/timing details.
    async fn daily_report(&self, date: NaiveDate) -> Result<Vec<DailyReportRow>>;

    /// Returns false if the ticket did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Service>>;

    async fn get_by_service_id(&self, service_id: &str) -> Result<Option<Service>>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Doctor>>;

    async fn list(&self) -> Result<Vec<Doctor>>;

    /// Compare-and-set status. Returns false if the doctor was not in `from`.
    async fn update_status_if(&self, id: i64, from: DoctorStatus, to: DoctorStatus)
        -> Result<bool>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Match on the digits of the stored phone number.
    async fn find_by_phone(&self, normalized_phone: &str) -> Result<Option<Patient>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Schedule>>;

    async fn create(&self, req: CreateScheduleRequest) -> Result<Schedule>;

    /// Returns false if the slot did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// All slots on `date` joined with their doctor, by doctor then start time.
    async fn list_with_doctors(&self, date: NaiveDate) -> Result<Vec<DoctorSlotRow>>;

    /// Earliest start and latest end across all slots on `date`.
    async fn time_bounds(&self, date: NaiveDate) -> Result<Option<(NaiveTime, NaiveTime)>>;

    /// Earliest slot on `date` in `cabinet`, with its doctor.
    async fn first_for_cabinet(&self, cabinet: i32, date: NaiveDate)
        -> Result<Option<CabinetSlot>>;

    /// Distinct cabinet numbers that have any slot.
    async fn list_cabinets(&self) -> Result<Vec<i32>>;

    /// One doctor's slots on `date` with bookings and ticket numbers.
    async fn doctor_day(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleWithAppointment>>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Appointment>>;

    /// Book a slot: locks it, fails with `SlotTaken` if unavailable, flips availability.
    async fn create(&self, req: CreateAppointmentRequest) -> Result<Appointment>;

    /// Delete an appointment and free its slot.
    async fn delete_and_free_slot(&self, id: i64) -> Result<()>;

    async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<PatientAppointment>>;

    /// Earliest ticketless appointment of `patient_id` on `date`.
    async fn next_unticketed(&self, patient_id: i64, date: NaiveDate)
        -> Result<Option<Appointment>>;
}

#[async_trait]
pub trait ReceptionLogRepository: Send + Sync {
    async fn list_for_ticket(&self, ticket_id: i64) -> Result<Vec<ReceptionLog>>;
}

#[async_trait]
pub trait RegistrarPriorityRepository: Send + Sync {
    /// Services the registrar serves first, by service id.
    async fn get(&self, registrar_id: i64) -> Result<Vec<Service>>;

    /// Replace the registrar's priority set.
    async fn set(&self, registrar_id: i64, service_ids: &[i64]) -> Result<()>;
}

#[async_trait]
pub trait BusinessProcessRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<BusinessProcess>>;

    async fn get(&self, name: &str) -> Result<Option<BusinessProcess>>;

    /// Returns false if no process has that name.
    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool>;
}

#[async_trait]
pub trait CleanupRepository: Send + Sync {
    /// Delete ticketless appointments, then finished tickets, in one transaction.
    async fn purge_finished(&self) -> Result<CleanupStats>;
}
