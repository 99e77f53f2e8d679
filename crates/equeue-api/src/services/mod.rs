//! Service layer for queue business logic.

pub mod doctor_board;
pub mod lifecycle;
pub mod process_gate;
pub mod schedule_board;

pub use doctor_board::DoctorBoard;
pub use lifecycle::TicketLifecycle;
pub use process_gate::ProcessGate;
pub use schedule_board::ScheduleBoard;
