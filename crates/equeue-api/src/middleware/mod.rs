//! Request middleware.

pub mod api_key;
pub mod process_gate;

pub use api_key::require_api_key;
pub use process_gate::{require_process, ProcessGuard};
