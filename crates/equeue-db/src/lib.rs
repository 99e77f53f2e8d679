//! # equeue-db
//!
//! PostgreSQL database layer for the equeue clinic queue.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every queue entity
//! - Transaction-scoped (`_tx`) building blocks for multi-step mutations
//! - Embedded migrations, including the change feed triggers
//!
//! ## Example
//!
//! ```rust,ignore
//! use equeue_db::{Database, TicketRepository, TicketStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/equeue").await?;
//!     db.migrate().await?;
//!
//!     let waiting = db.tickets.list_by_statuses(&[TicketStatus::Waiting]).await?;
//!     println!("{} tickets waiting", waiting.len());
//!     Ok(())
//! }
//! ```
pub mod appointments;
pub mod business_processes;
pub mod cleanup;
pub mod doctors;
pub mod patients;
pub mod pool;
pub mod priorities;
pub mod reception_logs;
pub mod schedules;
pub mod services;
pub mod tickets;

// Test fixtures for integration tests in this and downstream crates.
#[cfg(feature = "migrations")]
pub mod test_fixtures;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

// Re-export core types
pub use equeue_core::*;

pub use appointments::PgAppointmentRepository;
pub use business_processes::PgBusinessProcessRepository;
pub use cleanup::PgCleanupRepository;
pub use doctors::PgDoctorRepository;
pub use patients::PgPatientRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use priorities::PgRegistrarPriorityRepository;
pub use reception_logs::PgReceptionLogRepository;
pub use schedules::PgScheduleRepository;
pub use services::PgServiceRepository;
pub use tickets::PgTicketRepository;

/// Embedded schema migrations.
#[cfg(feature = "migrations")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// UTC instants bounding a local calendar day, `[start, end)`.
pub(crate) fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(NaiveTime::MIN);
    let start = Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));
    (start, start + chrono::Duration::days(1))
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub tickets: PgTicketRepository,
    pub services: PgServiceRepository,
    pub doctors: PgDoctorRepository,
    pub patients: PgPatientRepository,
    pub schedules: PgScheduleRepository,
    pub appointments: PgAppointmentRepository,
    /// Call-to-completion timing records.
    pub reception_logs: PgReceptionLogRepository,
    /// Registrar category priorities for call-next filtering.
    pub priorities: PgRegistrarPriorityRepository,
    /// Persistent side of the business-process gate.
    pub business_processes: PgBusinessProcessRepository,
    pub cleanup: PgCleanupRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            tickets: PgTicketRepository::new(pool.clone()),
            services: PgServiceRepository::new(pool.clone()),
            doctors: PgDoctorRepository::new(pool.clone()),
            patients: PgPatientRepository::new(pool.clone()),
            schedules: PgScheduleRepository::new(pool.clone()),
            appointments: PgAppointmentRepository::new(pool.clone()),
            reception_logs: PgReceptionLogRepository::new(pool.clone()),
            priorities: PgRegistrarPriorityRepository::new(pool.clone()),
            business_processes: PgBusinessProcessRepository::new(pool.clone()),
            cleanup: PgCleanupRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Start a transaction for composing `_tx` repository methods.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }
}
