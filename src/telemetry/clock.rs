//! Millisecond clocks for point timestamps.

use once_cell::sync::Lazy;
use std::sync::Mutex;
use tokio::time::Instant;

/// Source of monotonic timestamps in milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

static PROCESS_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic clock measured from a fixed origin.
///
/// Built on `tokio::time::Instant` so paused-time tests advance it together
/// with the runtime timers.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock relative to the first use of any process clock.
    pub fn process() -> Self {
        MonotonicClock {
            origin: *PROCESS_ORIGIN,
        }
    }

    /// Clock whose zero is the moment of construction.
    pub fn starting_now() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::process()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        Instant::now()
            .saturating_duration_since(self.origin)
            .as_secs_f64()
            * 1000.0
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        ManualClock {
            now: Mutex::new(start_ms),
        }
    }

    pub fn set(&self, ms: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = ms;
        }
    }

    pub fn advance(&self, ms: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += ms;
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or(0.0)
    }
}
