//! Ticket lifecycle engine.
//!
//! Every status change runs inside one transaction together with its
//! companion writes (appointment binding, reception log). Reception-log writes
//! are best-effort: they run in a savepoint, and a failure there is logged
//! and rolled back without failing the ticket transition.

use chrono::{DateTime, Local, Utc};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};

use equeue_core::defaults::CONFIRM_APPOINTMENT_SERVICE;
use equeue_core::{
    normalize_phone, AppointmentRepository, DailyReportRow, Error, PatientRepository,
    RegistrarPriorityRepository, RegistrarTicket, Result, Service, ServiceRepository,
    StatusUpdate, Ticket, TicketRepository, TicketStatus,
};
use equeue_db::Database;

/// Ticket state machine over the persistent store.
#[derive(Clone)]
pub struct TicketLifecycle {
    db: Database,
}

impl TicketLifecycle {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Issuing
    // =========================================================================

    /// Issue a `waiting` ticket for the service tagged `service_id`.
    pub async fn create(&self, service_id: &str) -> Result<Ticket> {
        let service = self.service(service_id).await?;

        let mut tx = self.db.begin().await?;
        let ticket = self
            .db
            .tickets
            .insert_next_tx(
                &mut tx,
                &service.letter,
                Some(service.service_id.as_str()),
                TicketStatus::Waiting,
            )
            .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "create",
            ticket_id = ticket.id,
            ticket_number = %ticket.ticket_number,
            service = %service.service_id,
            "Ticket issued"
        );
        Ok(ticket)
    }

    /// Issue a ticket for a patient's appointment today, found by phone.
    pub async fn check_in_by_phone(&self, phone: &str) -> Result<Ticket> {
        let digits = normalize_phone(phone);
        if digits.is_empty() {
            return Err(Error::InvalidInput(
                "phone must contain at least one digit".to_string(),
            ));
        }

        let patient = self
            .db
            .patients
            .find_by_phone(&digits)
            .await?
            .ok_or_else(|| Error::PatientNotFound(digits.clone()))?;

        let today = Local::now().date_naive();
        let appointment = self
            .db
            .appointments
            .next_unticketed(patient.id, today)
            .await?
            .ok_or(Error::NoUpcomingAppointment)?;

        let service = self.service(CONFIRM_APPOINTMENT_SERVICE).await?;

        let mut tx = self.db.begin().await?;

        // Re-check under lock: a concurrent check-in may have won.
        let locked = self
            .db
            .appointments
            .lock_tx(&mut tx, appointment.id)
            .await?
            .ok_or(Error::AppointmentNotFound(appointment.id))?;
        if locked.ticket_id.is_some() {
            return Err(Error::AppointmentHasTicket(locked.id));
        }

        let ticket = self
            .db
            .tickets
            .insert_next_tx(
                &mut tx,
                &service.letter,
                Some(service.service_id.as_str()),
                TicketStatus::Waiting,
            )
            .await?;
        self.db
            .appointments
            .attach_ticket_tx(&mut tx, locked.id, ticket.id)
            .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "check_in",
            ticket_id = ticket.id,
            ticket_number = %ticket.ticket_number,
            appointment_id = locked.id,
            patient_id = patient.id,
            "Patient checked in by phone"
        );
        Ok(ticket)
    }

    // =========================================================================
    // Calling
    // =========================================================================

    /// Claim the highest-ranked waiting ticket for `window_number`.
    ///
    /// `category` restricts the claim to one letter. Without it, the
    /// registrar's priority letters apply; no priorities means any letter.
    pub async fn call_next(
        &self,
        window_number: i32,
        category: Option<&str>,
        registrar_id: Option<i64>,
    ) -> Result<Ticket> {
        validate_window(window_number)?;
        let prefixes = self.call_prefixes(category, registrar_id).await?;

        let now = Local::now();
        let called_at = Utc::now();

        let mut tx = self.db.begin().await?;
        let ticket = self
            .db
            .tickets
            .claim_next_tx(
                &mut tx,
                &prefixes,
                window_number,
                now.date_naive(),
                now.time(),
                called_at,
            )
            .await?
            .ok_or(Error::QueueEmpty)?;

        self.append_log(&mut tx, &ticket, window_number, called_at, registrar_id)
            .await;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "call_next",
            ticket_id = ticket.id,
            ticket_number = %ticket.ticket_number,
            window_number,
            prefixes = ?prefixes,
            "Ticket called"
        );
        Ok(ticket)
    }

    /// Call one particular waiting ticket, bypassing the ranking.
    pub async fn call_specific(&self, ticket_id: i64, window_number: i32) -> Result<Ticket> {
        validate_window(window_number)?;

        let mut tx = self.db.begin().await?;
        let current = self.lock_ticket(&mut tx, ticket_id).await?;
        ensure_transition(&current, TicketStatus::Invited)?;

        let called_at = Utc::now();
        let ticket = self
            .db
            .tickets
            .mark_called_tx(&mut tx, ticket_id, window_number, called_at)
            .await?;

        self.append_log(&mut tx, &ticket, window_number, called_at, None)
            .await;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "call_specific",
            ticket_id,
            ticket_number = %ticket.ticket_number,
            window_number,
            "Ticket called"
        );
        Ok(ticket)
    }

    // =========================================================================
    // Doctor workflow
    // =========================================================================

    /// `registered` → `in_progress`.
    pub async fn start_appointment(&self, ticket_id: i64) -> Result<Ticket> {
        self.advance(ticket_id, TicketStatus::InProgress).await
    }

    /// `in_progress` → `completed`, closing the reception log.
    pub async fn complete_appointment(&self, ticket_id: i64) -> Result<Ticket> {
        self.advance(ticket_id, TicketStatus::Completed).await
    }

    async fn advance(&self, ticket_id: i64, target: TicketStatus) -> Result<Ticket> {
        let mut tx = self.db.begin().await?;
        let current = self.lock_ticket(&mut tx, ticket_id).await?;
        ensure_transition(&current, target)?;

        let at = Utc::now();
        let ticket = self
            .db
            .tickets
            .set_status_tx(&mut tx, ticket_id, target, at)
            .await?;
        if target == TicketStatus::Completed {
            self.close_log(&mut tx, ticket_id, at).await;
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "advance",
            ticket_id,
            ticket_number = %ticket.ticket_number,
            from = %current.status,
            to = %target,
            "Ticket status changed"
        );
        Ok(ticket)
    }

    // =========================================================================
    // Registrar workflow
    // =========================================================================

    /// Set any status from the registrar desk.
    ///
    /// A `completed` request against a ticket that is already `registered`
    /// is dropped and reported as [`StatusUpdate::Ignored`]. Other requests
    /// are applied as given.
    pub async fn update_status(&self, ticket_id: i64, status: TicketStatus) -> Result<StatusUpdate> {
        let mut tx = self.db.begin().await?;

        let previous = if status.needs_fresh_read() {
            let current = self.lock_ticket(&mut tx, ticket_id).await?;
            if TicketStatus::is_stale_completion(current.status, status) {
                debug!(
                    subsystem = "api",
                    component = "lifecycle",
                    op = "update_status",
                    ticket_id,
                    ticket_number = %current.ticket_number,
                    requested = %status,
                    "Stale completion ignored, ticket already registered"
                );
                return Ok(StatusUpdate::Ignored(current));
            }
            Some(current.status)
        } else {
            None
        };

        let at = Utc::now();
        let ticket = self
            .db
            .tickets
            .set_status_tx(&mut tx, ticket_id, status, at)
            .await?;
        if status == TicketStatus::Completed {
            self.close_log(&mut tx, ticket_id, at).await;
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "update_status",
            ticket_id,
            ticket_number = %ticket.ticket_number,
            from = ?previous,
            to = %status,
            "Ticket status set by registrar"
        );
        Ok(StatusUpdate::Applied(ticket))
    }

    /// Bind a freshly issued ticket to a ticketless appointment and register it.
    pub async fn confirm_appointment(&self, appointment_id: i64, ticket_id: i64) -> Result<Ticket> {
        let mut tx = self.db.begin().await?;

        let appointment = self
            .db
            .appointments
            .lock_tx(&mut tx, appointment_id)
            .await?
            .ok_or(Error::AppointmentNotFound(appointment_id))?;
        if appointment.ticket_id.is_some() {
            return Err(Error::AppointmentHasTicket(appointment_id));
        }

        let current = self.lock_ticket(&mut tx, ticket_id).await?;
        ensure_confirmable(&current)?;

        self.db
            .appointments
            .attach_ticket_tx(&mut tx, appointment_id, ticket_id)
            .await?;
        let ticket = self
            .db
            .tickets
            .set_status_tx(&mut tx, ticket_id, TicketStatus::Registered, Utc::now())
            .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "confirm",
            ticket_id,
            ticket_number = %ticket.ticket_number,
            appointment_id,
            "Appointment confirmed"
        );
        Ok(ticket)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, ticket_id: i64) -> Result<Ticket> {
        self.db
            .tickets
            .get(ticket_id)
            .await?
            .ok_or(Error::TicketNotFound(ticket_id))
    }

    /// The ticket currently invited to `window_number`, if any.
    pub async fn invited_for_window(&self, window_number: i32) -> Result<Option<Ticket>> {
        validate_window(window_number)?;
        self.db.tickets.find_invited_for_window(window_number).await
    }

    /// `waiting` and `invited` tickets, oldest first.
    pub async fn list_active(&self) -> Result<Vec<Ticket>> {
        self.db
            .tickets
            .list_by_statuses(&[TicketStatus::Waiting, TicketStatus::Invited])
            .await
    }

    /// The registrar desk list, filtered like [`Self::call_next`].
    pub async fn list_for_registrar(
        &self,
        category: Option<&str>,
        registrar_id: Option<i64>,
    ) -> Result<Vec<RegistrarTicket>> {
        let prefixes = self.call_prefixes(category, registrar_id).await?;
        self.db
            .tickets
            .list_for_registrar(
                &[
                    TicketStatus::Waiting,
                    TicketStatus::Registered,
                    TicketStatus::Completed,
                ],
                &prefixes,
            )
            .await
    }

    pub async fn services(&self) -> Result<Vec<Service>> {
        self.db.services.list().await
    }

    /// Today's tickets with doctor and timing details.
    pub async fn daily_report(&self) -> Result<Vec<DailyReportRow>> {
        self.db.tickets.daily_report(Local::now().date_naive()).await
    }

    pub async fn delete(&self, ticket_id: i64) -> Result<()> {
        if !self.db.tickets.delete(ticket_id).await? {
            return Err(Error::TicketNotFound(ticket_id));
        }
        info!(
            subsystem = "api",
            component = "lifecycle",
            op = "delete",
            ticket_id,
            "Ticket deleted"
        );
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn service(&self, service_id: &str) -> Result<Service> {
        self.db
            .services
            .get_by_service_id(service_id)
            .await?
            .ok_or_else(|| Error::UnknownService(service_id.to_string()))
    }

    async fn lock_ticket(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i64,
    ) -> Result<Ticket> {
        self.db
            .tickets
            .lock_tx(tx, ticket_id)
            .await?
            .ok_or(Error::TicketNotFound(ticket_id))
    }

    /// Letters a call or list is restricted to.
    async fn call_prefixes(
        &self,
        category: Option<&str>,
        registrar_id: Option<i64>,
    ) -> Result<Vec<String>> {
        if let Some(letter) = category.map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(vec![letter.to_string()]);
        }
        match registrar_id {
            Some(id) => Ok(self
                .db
                .priorities
                .get(id)
                .await?
                .into_iter()
                .map(|s| s.letter)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn append_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket: &Ticket,
        window_number: i32,
        called_at: DateTime<Utc>,
        registrar_id: Option<i64>,
    ) {
        let result: Result<()> = async {
            let mut savepoint = sqlx::Connection::begin(&mut **tx)
                .await
                .map_err(Error::Database)?;
            self.db
                .reception_logs
                .append_tx(&mut savepoint, ticket.id, window_number, called_at, registrar_id)
                .await?;
            savepoint.commit().await.map_err(Error::Database)
        }
        .await;

        if let Err(e) = result {
            warn!(
                subsystem = "api",
                component = "lifecycle",
                op = "append_log",
                ticket_id = ticket.id,
                window_number,
                error = %e,
                "Failed to write reception log"
            );
        }
    }

    async fn close_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i64,
        completed_at: DateTime<Utc>,
    ) {
        let result: Result<bool> = async {
            let mut savepoint = sqlx::Connection::begin(&mut **tx)
                .await
                .map_err(Error::Database)?;
            let closed = self
                .db
                .reception_logs
                .close_open_tx(&mut savepoint, ticket_id, completed_at)
                .await?;
            savepoint.commit().await.map_err(Error::Database)?;
            Ok(closed.is_some())
        }
        .await;

        match result {
            Ok(true) => {}
            Ok(false) => debug!(
                subsystem = "api",
                component = "lifecycle",
                op = "close_log",
                ticket_id,
                "No open reception log to close"
            ),
            Err(e) => warn!(
                subsystem = "api",
                component = "lifecycle",
                op = "close_log",
                ticket_id,
                error = %e,
                "Failed to close reception log"
            ),
        }
    }
}

fn validate_window(window_number: i32) -> Result<()> {
    if window_number <= 0 {
        return Err(Error::InvalidInput(
            "window_number must be positive".to_string(),
        ));
    }
    Ok(())
}

fn ensure_transition(ticket: &Ticket, target: TicketStatus) -> Result<()> {
    if ticket.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            ticket_id: ticket.id,
            status: ticket.status,
        })
    }
}

/// Tickets already with the doctor cannot be bound to another appointment.
/// Anything else, completed included, is re-registered.
fn ensure_confirmable(ticket: &Ticket) -> Result<()> {
    match ticket.status {
        TicketStatus::Registered | TicketStatus::InProgress => Err(Error::InvalidTransition {
            ticket_id: ticket.id,
            status: ticket.status,
        }),
        _ => Ok(()),
    }
}
