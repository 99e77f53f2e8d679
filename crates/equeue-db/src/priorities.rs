//! Registrar category priorities.
//!
//! A registrar with priorities only calls tickets whose letter belongs to one
//! of the prioritised services, unless the call names a category explicitly.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use equeue_core::{Error, RegistrarPriorityRepository, Result, Service};

use crate::services::PgServiceRepository;

/// PostgreSQL implementation of RegistrarPriorityRepository.
#[derive(Clone)]
pub struct PgRegistrarPriorityRepository {
    pool: Pool<Postgres>,
}

impl PgRegistrarPriorityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrarPriorityRepository for PgRegistrarPriorityRepository {
    async fn get(&self, registrar_id: i64) -> Result<Vec<Service>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.service_id, s.name, s.letter
            FROM services s
            JOIN registrar_category_priorities rcp ON rcp.service_id = s.id
            WHERE rcp.registrar_id = $1
            ORDER BY s.id ASC
            "#,
        )
        .bind(registrar_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(PgServiceRepository::parse_service_row)
            .collect())
    }

    async fn set(&self, registrar_id: i64, service_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM registrar_category_priorities WHERE registrar_id = $1")
            .bind(registrar_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if !service_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO registrar_category_priorities (registrar_id, service_id)
                SELECT $1, UNNEST($2::bigint[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(registrar_id)
            .bind(service_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let fk_violation = e
                    .as_database_error()
                    .and_then(|db| db.code())
                    .is_some_and(|code| code == "23503");
                if fk_violation {
                    Error::InvalidInput("unknown service id in priorities".to_string())
                } else {
                    Error::Database(e)
                }
            })?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
