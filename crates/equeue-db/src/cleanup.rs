//! Daily purge of finished queue data.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::info;

use equeue_core::{CleanupRepository, CleanupStats, Error, Result};

/// PostgreSQL implementation of CleanupRepository.
#[derive(Clone)]
pub struct PgCleanupRepository {
    pool: Pool<Postgres>,
}

impl PgCleanupRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CleanupRepository for PgCleanupRepository {
    async fn purge_finished(&self) -> Result<CleanupStats> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Only slots from past days; today's and future bookings may still get a ticket.
        let freed: Vec<i64> = sqlx::query_scalar(
            r#"
            DELETE FROM appointments a
            USING schedules s
            WHERE a.schedule_id = s.id
              AND a.ticket_id IS NULL
              AND s.date < CURRENT_DATE
            RETURNING a.schedule_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if !freed.is_empty() {
            sqlx::query("UPDATE schedules SET is_available = TRUE WHERE id = ANY($1)")
                .bind(&freed)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let tickets = sqlx::query("DELETE FROM tickets WHERE completed_at IS NOT NULL")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        let stats = CleanupStats {
            appointments_deleted: freed.len() as u64,
            tickets_deleted: tickets.rows_affected(),
        };
        info!(
            subsystem = "database",
            component = "cleanup",
            op = "purge_finished",
            appointments_deleted = stats.appointments_deleted,
            tickets_deleted = stats.tickets_deleted,
            "Purged finished queue data"
        );
        Ok(stats)
    }
}
