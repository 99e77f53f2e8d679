//! Schedule slot repository implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use equeue_core::{
    Appointment, CabinetSlot, CreateScheduleRequest, DoctorSlotRow, Error, Result, Schedule,
    ScheduleRepository, ScheduleWithAppointment,
};

use crate::doctors::PgDoctorRepository;

const SCHEDULE_COLUMNS: &str =
    "s.id, s.doctor_id, s.date, s.start_time, s.end_time, s.is_available, s.cabinet";

const DOCTOR_COLUMNS: &str =
    "d.id AS d_id, d.full_name AS d_full_name, d.specialization AS d_specialization, \
     d.status AS d_status";

/// PostgreSQL implementation of ScheduleRepository.
#[derive(Clone)]
pub struct PgScheduleRepository {
    pool: Pool<Postgres>,
}

impl PgScheduleRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_schedule_row(row: &PgRow) -> Schedule {
        Schedule {
            id: row.get("id"),
            doctor_id: row.get("doctor_id"),
            date: row.get("date"),
            start_time: row.get("start_time"),
            end_time: row.get("end_time"),
            is_available: row.get("is_available"),
            cabinet: row.get("cabinet"),
        }
    }

    fn map_write_error(err: sqlx::Error, doctor_id: i64) -> Error {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some("23505") => Error::Conflict(format!(
                "doctor {doctor_id} already has a slot starting at that time"
            )),
            Some("23503") => Error::DoctorNotFound(doctor_id),
            Some("23514") => Error::InvalidInput("slot must start before it ends".to_string()),
            _ => Error::Database(err),
        }
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn get(&self, id: i64) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_schedule_row))
    }

    async fn create(&self, req: CreateScheduleRequest) -> Result<Schedule> {
        let row = sqlx::query(&format!(
            "INSERT INTO schedules AS s (doctor_id, date, start_time, end_time, is_available, cabinet)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(req.doctor_id)
        .bind(req.date)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(req.is_available.unwrap_or(true))
        .bind(req.cabinet)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, req.doctor_id))?;

        Ok(Self::parse_schedule_row(&row))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_with_doctors(&self, date: NaiveDate) -> Result<Vec<DoctorSlotRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS}, {DOCTOR_COLUMNS}
             FROM schedules s
             JOIN doctors d ON d.id = s.doctor_id
             WHERE s.date = $1
             ORDER BY s.doctor_id ASC, s.start_time ASC"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(DoctorSlotRow {
                    doctor: PgDoctorRepository::parse_doctor_columns(row, "d_")?,
                    schedule: Self::parse_schedule_row(row),
                })
            })
            .collect()
    }

    async fn time_bounds(&self, date: NaiveDate) -> Result<Option<(NaiveTime, NaiveTime)>> {
        let row = sqlx::query(
            "SELECT MIN(start_time) AS min_start, MAX(end_time) AS max_end
             FROM schedules WHERE date = $1",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let min_start: Option<NaiveTime> = row.get("min_start");
        let max_end: Option<NaiveTime> = row.get("max_end");
        Ok(min_start.zip(max_end))
    }

    async fn first_for_cabinet(
        &self,
        cabinet: i32,
        date: NaiveDate,
    ) -> Result<Option<CabinetSlot>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS}, {DOCTOR_COLUMNS}
             FROM schedules s
             JOIN doctors d ON d.id = s.doctor_id
             WHERE s.cabinet = $1 AND s.date = $2
             ORDER BY s.start_time ASC
             LIMIT 1"
        ))
        .bind(cabinet)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(|r| {
                Ok(CabinetSlot {
                    schedule: Self::parse_schedule_row(r),
                    doctor: PgDoctorRepository::parse_doctor_columns(r, "d_")?,
                })
            })
            .transpose()
    }

    async fn list_cabinets(&self) -> Result<Vec<i32>> {
        sqlx::query_scalar(
            "SELECT DISTINCT cabinet FROM schedules WHERE cabinet IS NOT NULL ORDER BY cabinet",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn doctor_day(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleWithAppointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS},
                    a.id AS a_id, a.patient_id AS a_patient_id, a.ticket_id AS a_ticket_id,
                    a.created_at AS a_created_at,
                    t.ticket_number
             FROM schedules s
             LEFT JOIN appointments a ON a.schedule_id = s.id
             LEFT JOIN tickets t ON t.id = a.ticket_id
             WHERE s.doctor_id = $1 AND s.date = $2
             ORDER BY s.start_time ASC"
        ))
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| {
                let schedule = Self::parse_schedule_row(row);
                let appointment_id: Option<i64> = row.get("a_id");
                let appointment = appointment_id.map(|id| Appointment {
                    id,
                    schedule_id: schedule.id,
                    patient_id: row.get("a_patient_id"),
                    ticket_id: row.get("a_ticket_id"),
                    created_at: row.get("a_created_at"),
                });
                ScheduleWithAppointment {
                    schedule,
                    appointment,
                    ticket_number: row.get("ticket_number"),
                }
            })
            .collect())
    }
}
