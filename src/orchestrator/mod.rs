//! Run orchestration: lifecycle state and the `RunController`.

pub mod run_controller;
pub mod state;

pub use run_controller::RunController;
pub use state::{RunState, StopReason};
