//! Ticket repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};

use crate::local_day_bounds;
use equeue_core::{
    format_ticket_number, next_ticket_suffix, DailyReportRow, DoctorQueueEntry, Error,
    RegistrarTicket, Result, Ticket, TicketRepository, TicketStatus,
};

use equeue_core::defaults::{CALL_SOON_WINDOW_MINUTES, UNKNOWN_PATIENT_LABEL};

/// Ticket columns qualified with the `t` alias used by every query here.
const TICKET_COLUMNS: &str = "t.id, t.ticket_number, t.status, t.service_type, t.window_number, \
     t.qr_code, t.created_at, t.called_at, t.started_at, t.completed_at";

/// PostgreSQL implementation of TicketRepository.
#[derive(Clone)]
pub struct PgTicketRepository {
    pool: Pool<Postgres>,
}

impl PgTicketRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_ticket_row(row: &PgRow) -> Result<Ticket> {
        let status: String = row.get("status");
        Ok(Ticket {
            id: row.get("id"),
            ticket_number: row.get("ticket_number"),
            status: status.parse()?,
            service_type: row.get("service_type"),
            window_number: row.get("window_number"),
            qr_code: row.get("qr_code"),
            created_at: row.get("created_at"),
            called_at: row.get("called_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    fn status_strings(statuses: &[TicketStatus]) -> Vec<String> {
        statuses.iter().map(|s| s.as_str().to_string()).collect()
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn get(&self, id: i64) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_ticket_row).transpose()
    }

    async fn get_by_number(&self, ticket_number: &str) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.ticket_number = $1"
        ))
        .bind(ticket_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_ticket_row).transpose()
    }

    async fn list_by_statuses(&self, statuses: &[TicketStatus]) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t
             WHERE t.status = ANY($1::text[])
             ORDER BY t.created_at ASC"
        ))
        .bind(Self::status_strings(statuses))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_ticket_row).collect()
    }

    async fn list_for_registrar(
        &self,
        statuses: &[TicketStatus],
        prefixes: &[String],
    ) -> Result<Vec<RegistrarTicket>> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS},
                    to_char(s.date + s.start_time, 'YYYY-MM-DD HH24:MI:SS') AS appointment_time
             FROM tickets t
             LEFT JOIN appointments a ON a.ticket_id = t.id
             LEFT JOIN schedules s ON s.id = a.schedule_id
             WHERE t.status = ANY($1::text[])
               AND (cardinality($2::text[]) = 0 OR LEFT(t.ticket_number, 1) = ANY($2::text[]))
             ORDER BY t.created_at DESC"
        ))
        .bind(Self::status_strings(statuses))
        .bind(prefixes)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(RegistrarTicket {
                    ticket: Self::parse_ticket_row(row)?,
                    appointment_time: row.get("appointment_time"),
                })
            })
            .collect()
    }

    async fn find_invited_for_window(&self, window_number: i32) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t
             WHERE t.status = 'invited' AND t.window_number = $1
             ORDER BY t.called_at DESC NULLS LAST
             LIMIT 1"
        ))
        .bind(window_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_ticket_row).transpose()
    }

    async fn list_for_doctor(
        &self,
        status: TicketStatus,
        doctor_id: Option<i64>,
    ) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS}
             FROM tickets t
             JOIN appointments a ON a.ticket_id = t.id
             JOIN schedules s ON s.id = a.schedule_id
             WHERE t.status = $1
               AND ($2::bigint IS NULL OR s.doctor_id = $2)
             ORDER BY s.date ASC, s.start_time ASC"
        ))
        .bind(status.as_str())
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_ticket_row).collect()
    }

    async fn cabinet_queue(&self, cabinet: i32, date: NaiveDate) -> Result<Vec<DoctorQueueEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT to_char(s.start_time, 'HH24:MI') AS start_time,
                   t.ticket_number,
                   COALESCE(p.full_name, $3) AS patient_full_name,
                   t.status
            FROM tickets t
            JOIN appointments a ON a.ticket_id = t.id
            JOIN schedules s ON s.id = a.schedule_id
            LEFT JOIN patients p ON p.id = a.patient_id
            WHERE s.cabinet = $1
              AND s.date = $2
              AND t.status IN ('in_progress', 'registered')
            ORDER BY CASE WHEN t.status = 'in_progress' THEN 0 ELSE 1 END,
                     s.start_time ASC
            "#,
        )
        .bind(cabinet)
        .bind(date)
        .bind(UNKNOWN_PATIENT_LABEL)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(DoctorQueueEntry {
                    start_time: row.get("start_time"),
                    ticket_number: row.get("ticket_number"),
                    patient_full_name: row.get("patient_full_name"),
                    status: status.parse()?,
                })
            })
            .collect()
    }

    async fn daily_report(&self, date: NaiveDate) -> Result<Vec<DailyReportRow>> {
        let (day_start, day_end) = local_day_bounds(date);
        let rows = sqlx::query(
            r#"
            SELECT t.ticket_number,
                   d.full_name AS doctor_full_name,
                   d.specialization AS doctor_specialization,
                   s.cabinet AS cabinet_number,
                   to_char(s.start_time, 'HH24:MI') AS appointment_time,
                   t.status,
                   t.called_at,
                   t.completed_at,
                   to_char(t.completed_at - COALESCE(t.started_at, t.called_at), 'HH24:MI:SS') AS duration
            FROM tickets t
            LEFT JOIN appointments a ON a.ticket_id = t.id
            LEFT JOIN schedules s ON s.id = a.schedule_id
            LEFT JOIN doctors d ON d.id = s.doctor_id
            WHERE t.created_at >= $1 AND t.created_at < $2
            ORDER BY t.created_at ASC
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(DailyReportRow {
                    ticket_number: row.get("ticket_number"),
                    doctor_full_name: row.get("doctor_full_name"),
                    doctor_specialization: row.get("doctor_specialization"),
                    cabinet_number: row.get("cabinet_number"),
                    appointment_time: row.get("appointment_time"),
                    status: status.parse()?,
                    called_at: row.get("called_at"),
                    completed_at: row.get("completed_at"),
                    duration: row.get("duration"),
                })
            })
            .collect()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Transaction-scoped operations composed by the lifecycle engine.
impl PgTicketRepository {
    /// Allocate the next number for `letter` and insert a ticket in `status`.
    ///
    /// Allocation is serialised per letter with a transaction-scoped advisory
    /// lock, so concurrent issuers of the same letter never read the same max.
    pub async fn insert_next_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        letter: &str,
        service_type: Option<&str>,
        status: TicketStatus,
    ) -> Result<Ticket> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('ticket_number:' || $1))")
            .bind(letter)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let max_suffix: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(CAST(SUBSTRING(ticket_number FROM 2) AS INTEGER)), 0)
            FROM tickets
            WHERE ticket_number LIKE $1 || '%'
            "#,
        )
        .bind(letter)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let ticket_number = format_ticket_number(letter, next_ticket_suffix(max_suffix));

        let row = sqlx::query(&format!(
            "INSERT INTO tickets AS t (ticket_number, status, service_type, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(&ticket_number)
        .bind(status.as_str())
        .bind(service_type)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Self::parse_ticket_row(&row)
    }

    /// Lock a ticket row for the rest of the transaction.
    pub async fn lock_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_ticket_row).transpose()
    }

    /// Claim the highest-ranked waiting ticket and mark it invited to `window_number`.
    ///
    /// Rank: linked slot today already started (0), starting within the next
    /// few minutes (1), anything else including walk-ins (2); then slot start,
    /// then creation time. Rows locked by a concurrent claim are skipped.
    #[allow(clippy::too_many_arguments)]
    pub async fn claim_next_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        prefixes: &[String],
        window_number: i32,
        today: NaiveDate,
        now: NaiveTime,
        called_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tickets AS t
            SET status = 'invited', window_number = $1, called_at = $2
            WHERE t.id = (
                SELECT w.id
                FROM tickets w
                LEFT JOIN appointments a ON a.ticket_id = w.id
                LEFT JOIN schedules s ON s.id = a.schedule_id AND s.date = $3
                WHERE w.status = 'waiting'
                  AND (cardinality($4::text[]) = 0 OR LEFT(w.ticket_number, 1) = ANY($4::text[]))
                ORDER BY
                    CASE
                        WHEN s.start_time IS NOT NULL AND s.start_time < $5 THEN 0
                        WHEN s.start_time IS NOT NULL
                             AND s.start_time <= $5 + make_interval(mins => $6) THEN 1
                        ELSE 2
                    END,
                    s.start_time ASC NULLS LAST,
                    w.created_at ASC
                LIMIT 1
                FOR UPDATE OF w SKIP LOCKED
            )
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(window_number)
        .bind(called_at)
        .bind(today)
        .bind(prefixes)
        .bind(now)
        .bind(CALL_SOON_WINDOW_MINUTES)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_ticket_row).transpose()
    }

    /// Mark a (locked) ticket invited to `window_number`.
    pub async fn mark_called_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        window_number: i32,
        called_at: DateTime<Utc>,
    ) -> Result<Ticket> {
        let row = sqlx::query(&format!(
            "UPDATE tickets AS t
             SET status = 'invited', window_number = $2, called_at = $3
             WHERE t.id = $1
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .bind(window_number)
        .bind(called_at)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(Self::parse_ticket_row)
            .transpose()?
            .ok_or(Error::TicketNotFound(id))
    }

    /// Write `status`, stamping `started_at` on entering `in_progress`.
    ///
    /// `completed_at` is set exactly when the new status is `completed` and
    /// cleared otherwise.
    pub async fn set_status_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        status: TicketStatus,
        at: DateTime<Utc>,
    ) -> Result<Ticket> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tickets AS t
            SET status = $2::text,
                started_at = CASE WHEN $2::text = 'in_progress' THEN $3 ELSE t.started_at END,
                completed_at = CASE WHEN $2::text = 'completed' THEN $3 ELSE NULL END
            WHERE t.id = $1
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(Self::parse_ticket_row)
            .transpose()?
            .ok_or(Error::TicketNotFound(id))
    }
}
