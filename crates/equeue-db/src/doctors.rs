//! Doctor repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use equeue_core::{Doctor, DoctorRepository, DoctorStatus, Error, Result};

/// PostgreSQL implementation of DoctorRepository.
#[derive(Clone)]
pub struct PgDoctorRepository {
    pool: Pool<Postgres>,
}

impl PgDoctorRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a doctor from columns aliased with `prefix` (e.g. `doctor_`).
    pub(crate) fn parse_doctor_columns(row: &PgRow, prefix: &str) -> Result<Doctor> {
        let status: String = row.get(format!("{prefix}status").as_str());
        Ok(Doctor {
            id: row.get(format!("{prefix}id").as_str()),
            full_name: row.get(format!("{prefix}full_name").as_str()),
            specialization: row.get(format!("{prefix}specialization").as_str()),
            status: status.parse()?,
        })
    }
}

#[async_trait]
impl DoctorRepository for PgDoctorRepository {
    async fn get(&self, id: i64) -> Result<Option<Doctor>> {
        let row = sqlx::query(
            "SELECT id, full_name, specialization, status FROM doctors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(|r| Self::parse_doctor_columns(r, ""))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Doctor>> {
        let rows = sqlx::query(
            "SELECT id, full_name, specialization, status FROM doctors ORDER BY full_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|r| Self::parse_doctor_columns(r, ""))
            .collect()
    }

    async fn update_status_if(
        &self,
        id: i64,
        from: DoctorStatus,
        to: DoctorStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE doctors SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
