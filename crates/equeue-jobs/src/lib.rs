//! # equeue-jobs
//!
//! Long-lived background tasks for the clinic queue.
//!
//! This crate provides:
//! - The change feed listener relaying PostgreSQL `NOTIFY` payloads into the
//!   notification broker
//! - The daily maintenance timer purging finished tickets
//!
//! ## Example
//!
//! ```ignore
//! use equeue_core::Broker;
//! use equeue_db::Database;
//! use equeue_jobs::{ChangeFeedListener, ListenerConfig, MaintenanceConfig, MaintenanceTimer};
//!
//! let db = Database::connect("postgres://...").await?;
//! let broker = Broker::new();
//!
//! let listener = ChangeFeedListener::new(db.pool.clone(), broker.clone(), ListenerConfig::from_env())
//!     .start();
//! let maintenance = MaintenanceTimer::from_database(&db, MaintenanceConfig::from_env()).start();
//!
//! // Graceful shutdown
//! listener.shutdown().await?;
//! maintenance.shutdown().await?;
//! ```

pub mod listener;
pub mod maintenance;

pub use listener::{ChangeFeedListener, ListenerConfig, ListenerHandle};
pub use maintenance::{MaintenanceConfig, MaintenanceHandle, MaintenanceTimer};
