//! Appointment repository implementation.
//!
//! Booking and cancellation touch both the appointment and its slot; each
//! runs in one transaction with the slot row locked so a slot can never be
//! double-booked or left unavailable without an appointment.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;

use equeue_core::{
    Appointment, AppointmentRepository, CreateAppointmentRequest, Error, PatientAppointment,
    Result, Schedule,
};

const APPOINTMENT_COLUMNS: &str = "a.id, a.schedule_id, a.patient_id, a.ticket_id, a.created_at";

/// PostgreSQL implementation of AppointmentRepository.
#[derive(Clone)]
pub struct PgAppointmentRepository {
    pool: Pool<Postgres>,
}

impl PgAppointmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_appointment_row(row: &PgRow) -> Appointment {
        Appointment {
            id: row.get("id"),
            schedule_id: row.get("schedule_id"),
            patient_id: row.get("patient_id"),
            ticket_id: row.get("ticket_id"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl AppointmentRepository for PgAppointmentRepository {
    async fn get(&self, id: i64) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_appointment_row))
    }

    async fn create(&self, req: CreateAppointmentRequest) -> Result<Appointment> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let available: Option<bool> =
            sqlx::query_scalar("SELECT is_available FROM schedules WHERE id = $1 FOR UPDATE")
                .bind(req.schedule_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        match available {
            None => return Err(Error::ScheduleNotFound(req.schedule_id)),
            Some(false) => return Err(Error::SlotTaken(req.schedule_id)),
            Some(true) => {}
        }

        let row = sqlx::query(&format!(
            "INSERT INTO appointments AS a (schedule_id, patient_id, created_at)
             VALUES ($1, $2, $3)
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(req.schedule_id)
        .bind(req.patient_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE schedules SET is_available = FALSE WHERE id = $1")
            .bind(req.schedule_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        let appointment = Self::parse_appointment_row(&row);
        debug!(
            subsystem = "database",
            component = "appointments",
            op = "create",
            appointment_id = appointment.id,
            schedule_id = appointment.schedule_id,
            "Slot booked"
        );
        Ok(appointment)
    }

    async fn delete_and_free_slot(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let schedule_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM appointments WHERE id = $1 RETURNING schedule_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let schedule_id = schedule_id.ok_or(Error::AppointmentNotFound(id))?;

        sqlx::query("UPDATE schedules SET is_available = TRUE WHERE id = $1")
            .bind(schedule_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<PatientAppointment>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.created_at, a.ticket_id,
                   s.id AS s_id, s.doctor_id, s.date, s.start_time, s.end_time,
                   s.is_available, s.cabinet,
                   d.full_name AS doctor_name, d.specialization AS doctor_specialization
            FROM appointments a
            JOIN schedules s ON s.id = a.schedule_id
            JOIN doctors d ON d.id = s.doctor_id
            WHERE a.patient_id = $1
            ORDER BY s.date DESC, s.start_time DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| PatientAppointment {
                id: row.get("id"),
                created_at: row.get("created_at"),
                schedule: Schedule {
                    id: row.get("s_id"),
                    doctor_id: row.get("doctor_id"),
                    date: row.get("date"),
                    start_time: row.get("start_time"),
                    end_time: row.get("end_time"),
                    is_available: row.get("is_available"),
                    cabinet: row.get("cabinet"),
                },
                doctor_name: row.get("doctor_name"),
                doctor_specialization: row.get("doctor_specialization"),
                ticket_id: row.get("ticket_id"),
            })
            .collect())
    }

    async fn next_unticketed(
        &self,
        patient_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointments a
             JOIN schedules s ON s.id = a.schedule_id
             WHERE a.patient_id = $1 AND a.ticket_id IS NULL AND s.date = $2
             ORDER BY s.start_time ASC
             LIMIT 1"
        ))
        .bind(patient_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_appointment_row))
    }
}

/// Transaction-scoped operations for check-in and confirmation.
impl PgAppointmentRepository {
    /// Lock an appointment row for the rest of the transaction.
    pub async fn lock_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_appointment_row))
    }

    /// Attach a ticket to an appointment.
    pub async fn attach_ticket_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        ticket_id: i64,
    ) -> Result<Appointment> {
        let row = sqlx::query(&format!(
            "UPDATE appointments AS a SET ticket_id = $2 WHERE a.id = $1
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(ticket_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(Self::parse_appointment_row)
            .ok_or(Error::AppointmentNotFound(id))
    }
}
