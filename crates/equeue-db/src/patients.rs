//! Patient lookups used by phone check-in.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use equeue_core::{Error, Patient, PatientRepository, Result};

/// PostgreSQL implementation of PatientRepository.
#[derive(Clone)]
pub struct PgPatientRepository {
    pool: Pool<Postgres>,
}

impl PgPatientRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientRepository for PgPatientRepository {
    async fn find_by_phone(&self, normalized_phone: &str) -> Result<Option<Patient>> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, phone
            FROM patients
            WHERE regexp_replace(phone, '[^0-9]+', '', 'g') = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(normalized_phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| Patient {
            id: r.get("id"),
            full_name: r.get("full_name"),
            phone: r.get("phone"),
        }))
    }
}
