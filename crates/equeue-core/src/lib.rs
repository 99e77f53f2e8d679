//! # equeue-core
//!
//! Core types, traits, and the notification broker for the clinic queue.
//!
//! This crate provides the domain model (tickets, slots, appointments,
//! doctors, business processes), the ticket and doctor state machines, the
//! error taxonomy shared by every crate, and the in-process pub/sub broker
//! feeding live boards.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, side-channel write skipped, message dropped |
//! | INFO  | Lifecycle events (startup, shutdown), state transitions |
//! | DEBUG | Decision points, subscriber bookkeeping |
//!
//! Every event carries `subsystem` (`api`, `database`, `broker`, `listener`,
//! `maintenance`) and, where meaningful, `component` and `op`.

pub mod broker;
pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use broker::{Broker, Notification, PublishReport, SubscriberId, Subscription};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
