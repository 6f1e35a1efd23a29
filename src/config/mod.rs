//! Scenario configuration and runtime tuning.
//!
//! # Module Structure
//!
//! - `loader`: reads and writes scenario files (`.json` / `.toml`)
//! - `validator`: range checks for scenarios coming from the command line
//!   or a file, plus the materialized-node budget
//!
//! The telemetry core and the workload never validate a `Scenario`; only the
//! control surface (the `loadlab` binary) runs it through the validator.

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default tick rate of the notifier and the frame source (about 60 Hz).
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// Default per-series point capacity.
pub const DEFAULT_SERIES_CAPACITY: usize = 5000;

/// Default memory sample interval in milliseconds.
pub const DEFAULT_MEMORY_INTERVAL_MS: u64 = 1000;

/// Process-level tuning of the telemetry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Refresh signal frequency driving the notifier tick and the frame source
    pub refresh_hz: f64,
    /// Maximum retained points per series
    pub series_capacity: usize,
    /// Memory source sampling interval
    pub memory_interval_ms: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            refresh_hz: DEFAULT_REFRESH_HZ,
            series_capacity: DEFAULT_SERIES_CAPACITY,
            memory_interval_ms: DEFAULT_MEMORY_INTERVAL_MS,
        }
    }
}

impl RuntimeOptions {
    /// Period of one refresh tick. Non-positive or non-finite rates fall back
    /// to the default rate.
    pub fn refresh_period(&self) -> Duration {
        let hz = if self.refresh_hz.is_finite() && self.refresh_hz > 0.0 {
            self.refresh_hz
        } else {
            DEFAULT_REFRESH_HZ
        };
        Duration::from_secs_f64(1.0 / hz)
    }

    pub fn memory_interval(&self) -> Duration {
        Duration::from_millis(self.memory_interval_ms.max(1))
    }
}
