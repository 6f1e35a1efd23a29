//! Run lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a `RunController`: `Idle -> Running -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No run active; the last window (if any) is closed
    Idle,
    /// Scheduler and sampling sources are active, window open
    Running,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured duration elapsed
    DurationElapsed,
    /// `stop()` was called
    Requested,
    /// The controller was dropped while running
    Teardown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::DurationElapsed => write!(f, "duration elapsed"),
            StopReason::Requested => write!(f, "requested"),
            StopReason::Teardown => write!(f, "teardown"),
        }
    }
}
