//! Business process switches.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use equeue_core::{BusinessProcess, BusinessProcessRepository, Error, Result};

/// PostgreSQL implementation of BusinessProcessRepository.
#[derive(Clone)]
pub struct PgBusinessProcessRepository {
    pool: Pool<Postgres>,
}

impl PgBusinessProcessRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_process_row(row: &PgRow) -> BusinessProcess {
        BusinessProcess {
            process_name: row.get("process_name"),
            is_enabled: row.get("is_enabled"),
        }
    }
}

#[async_trait]
impl BusinessProcessRepository for PgBusinessProcessRepository {
    async fn list(&self) -> Result<Vec<BusinessProcess>> {
        let rows = sqlx::query(
            "SELECT process_name, is_enabled FROM business_processes ORDER BY process_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_process_row).collect())
    }

    async fn get(&self, name: &str) -> Result<Option<BusinessProcess>> {
        let row = sqlx::query(
            "SELECT process_name, is_enabled FROM business_processes WHERE process_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_process_row))
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE business_processes SET is_enabled = $2 WHERE process_name = $1")
                .bind(name)
                .bind(enabled)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
