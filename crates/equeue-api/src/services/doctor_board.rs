//! Doctor and cabinet queue projection.
//!
//! A cabinet board shows who is receiving today and the ordered queue in front
//! of them. The projection is rebuilt from the store on every request; it is
//! never patched incrementally.

use chrono::Local;
use tracing::{error, info};

use equeue_core::defaults::NO_RECEPTION_MESSAGE;
use equeue_core::{
    Broker, Doctor, DoctorAction, DoctorRepository, DoctorScreenState, Error, Notification,
    Result, ScheduleRepository, Ticket, TicketRepository, TicketStatus,
};
use equeue_db::Database;

/// Read model and status actions for doctors and cabinet boards.
#[derive(Clone)]
pub struct DoctorBoard {
    db: Database,
    broker: Broker,
}

impl DoctorBoard {
    pub fn new(db: Database, broker: Broker) -> Self {
        Self { db, broker }
    }

    /// Board state for `cabinet` right now.
    ///
    /// The doctor is the one on the earliest slot in the cabinet today. If the
    /// queue query fails, the board still reports the doctor with an empty queue.
    pub async fn screen_state(&self, cabinet: i32) -> Result<DoctorScreenState> {
        let today = Local::now().date_naive();

        let Some(slot) = self.db.schedules.first_for_cabinet(cabinet, today).await? else {
            return Ok(DoctorScreenState::empty(cabinet, NO_RECEPTION_MESSAGE));
        };

        let queue = match self.db.tickets.cabinet_queue(cabinet, today).await {
            Ok(queue) => queue,
            Err(e) => {
                error!(
                    subsystem = "api",
                    component = "doctor_board",
                    op = "cabinet_queue",
                    cabinet,
                    error = %e,
                    "Queue query failed, showing empty queue"
                );
                Vec::new()
            }
        };

        Ok(DoctorScreenState {
            doctor_name: slot.doctor.full_name,
            doctor_specialty: slot.doctor.specialization,
            cabinet_number: cabinet,
            queue,
            message: None,
            doctor_status: slot.doctor.status,
        })
    }

    /// Cabinet numbers that appear in any slot.
    pub async fn list_cabinets(&self) -> Result<Vec<i32>> {
        self.db.schedules.list_cabinets().await
    }

    /// Every doctor, for pickers.
    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        self.db.doctors.list().await
    }

    /// `registered` tickets with a slot, optionally for one doctor.
    pub async fn registered_tickets(&self, doctor_id: Option<i64>) -> Result<Vec<Ticket>> {
        self.db
            .tickets
            .list_for_doctor(TicketStatus::Registered, doctor_id)
            .await
    }

    /// `in_progress` tickets with a slot, optionally for one doctor.
    pub async fn in_progress_tickets(&self, doctor_id: Option<i64>) -> Result<Vec<Ticket>> {
        self.db
            .tickets
            .list_for_doctor(TicketStatus::InProgress, doctor_id)
            .await
    }

    /// Apply a break or login action and announce the new status.
    pub async fn apply(&self, doctor_id: i64, action: DoctorAction) -> Result<Doctor> {
        let doctor = self
            .db
            .doctors
            .get(doctor_id)
            .await?
            .ok_or(Error::DoctorNotFound(doctor_id))?;

        let next = doctor.status.apply(action).ok_or_else(|| {
            Error::DoctorStatusConflict(format!(
                "doctor {doctor_id} is {}, {action:?} not allowed",
                doctor.status
            ))
        })?;

        if !self
            .db
            .doctors
            .update_status_if(doctor_id, doctor.status, next)
            .await?
        {
            return Err(Error::DoctorStatusConflict(format!(
                "doctor {doctor_id} status changed concurrently"
            )));
        }

        info!(
            subsystem = "api",
            component = "doctor_board",
            op = "status",
            doctor_id,
            from = %doctor.status,
            to = %next,
            "Doctor status changed"
        );

        self.broker.publish(Notification::DoctorStatus {
            doctor_id,
            status: next,
        });

        Ok(Doctor {
            status: next,
            ..doctor
        })
    }
}
