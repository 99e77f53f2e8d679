//! Terminal service catalogue.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use equeue_core::{Error, Result, Service, ServiceRepository};

/// PostgreSQL implementation of ServiceRepository.
#[derive(Clone)]
pub struct PgServiceRepository {
    pool: Pool<Postgres>,
}

impl PgServiceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub(crate) fn parse_service_row(row: &PgRow) -> Service {
        Service {
            id: row.get("id"),
            service_id: row.get("service_id"),
            name: row.get("name"),
            letter: row.get("letter"),
        }
    }
}

#[async_trait]
impl ServiceRepository for PgServiceRepository {
    async fn list(&self) -> Result<Vec<Service>> {
        let rows = sqlx::query("SELECT id, service_id, name, letter FROM services ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_service_row).collect())
    }

    async fn get_by_service_id(&self, service_id: &str) -> Result<Option<Service>> {
        let row = sqlx::query(
            "SELECT id, service_id, name, letter FROM services WHERE service_id = $1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_service_row))
    }
}
