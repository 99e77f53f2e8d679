//! Reception log repository implementation.
//!
//! One row per registrar-window call. The row is opened when the ticket is
//! called and closed when the visit is finalised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};

use equeue_core::{Error, ReceptionLog, ReceptionLogRepository, Result};

const LOG_COLUMNS: &str = "r.id, r.ticket_id, r.registrar_id, r.window_number, r.called_at, \
     r.completed_at, EXTRACT(EPOCH FROM r.duration)::BIGINT AS duration_secs";

/// PostgreSQL implementation of ReceptionLogRepository.
#[derive(Clone)]
pub struct PgReceptionLogRepository {
    pool: Pool<Postgres>,
}

impl PgReceptionLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_log_row(row: &PgRow) -> ReceptionLog {
        ReceptionLog {
            id: row.get("id"),
            ticket_id: row.get("ticket_id"),
            registrar_id: row.get("registrar_id"),
            window_number: row.get("window_number"),
            called_at: row.get("called_at"),
            completed_at: row.get("completed_at"),
            duration_secs: row.get("duration_secs"),
        }
    }

    /// Open a log row for a call.
    pub async fn append_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i64,
        window_number: i32,
        called_at: DateTime<Utc>,
        registrar_id: Option<i64>,
    ) -> Result<ReceptionLog> {
        let row = sqlx::query(&format!(
            "INSERT INTO reception_logs AS r (ticket_id, registrar_id, window_number, called_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(ticket_id)
        .bind(registrar_id)
        .bind(window_number)
        .bind(called_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_log_row(&row))
    }

    /// Close the most recent open log row of a ticket.
    ///
    /// Duration runs from the ticket's `started_at`, or from the call when
    /// the visit never started. Returns `None` when no row was open.
    pub async fn close_open_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<ReceptionLog>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reception_logs AS r
            SET completed_at = $2,
                duration = $2 - COALESCE(t.started_at, r.called_at)
            FROM tickets t
            WHERE t.id = r.ticket_id
              AND r.id = (
                  SELECT o.id FROM reception_logs o
                  WHERE o.ticket_id = $1 AND o.completed_at IS NULL
                  ORDER BY o.called_at DESC
                  LIMIT 1
              )
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(ticket_id)
        .bind(completed_at)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_log_row))
    }
}

#[async_trait]
impl ReceptionLogRepository for PgReceptionLogRepository {
    async fn list_for_ticket(&self, ticket_id: i64) -> Result<Vec<ReceptionLog>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM reception_logs r
             WHERE r.ticket_id = $1
             ORDER BY r.called_at ASC"
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_log_row).collect())
    }
}
