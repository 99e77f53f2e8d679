//! HTTP handlers, grouped by the desk or board they serve.

pub mod admin;
pub mod boards;
pub mod doctor;
pub mod registrar;
pub mod tickets;
