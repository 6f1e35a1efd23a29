//! Sampling sources feeding the series store.
//!
//! A source declares the series it writes, receives a `SeriesWriter` on
//! `start`, and must stop producing points once `stop` returns.

pub mod frame;
pub mod memory;
pub mod profiler;

use std::sync::Arc;

use super::clock::Clock;
use super::store::{SeriesStore, Value};
use crate::error::SourceError;

pub use frame::FrameSource;
pub use memory::{MemoryProbe, MemoryReading, MemorySource, SysinfoProbe};
pub use profiler::{CommitObservation, CommitPhase, ProfilerSink};

/// Series key and display unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDescriptor {
    pub key: &'static str,
    pub units: &'static str,
}

impl SeriesDescriptor {
    pub const fn new(key: &'static str, units: &'static str) -> Self {
        SeriesDescriptor { key, units }
    }
}

/// Push handle given to sources: stamps points with the shared clock.
#[derive(Clone)]
pub struct SeriesWriter {
    store: Arc<SeriesStore>,
    clock: Arc<dyn Clock>,
}

impl SeriesWriter {
    pub fn new(store: Arc<SeriesStore>, clock: Arc<dyn Clock>) -> Self {
        SeriesWriter { store, clock }
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Push at an explicit timestamp.
    pub fn push(&self, key: &str, t: f64, v: impl Into<Value>) {
        self.store.push(key, t, v);
    }

    /// Push stamped with the current clock reading.
    pub fn push_now(&self, key: &str, v: impl Into<Value>) {
        let t = self.now();
        self.store.push(key, t, v);
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }
}

/// Contract between the metrics engine and a sampling source.
pub trait SamplingSource: Send {
    /// Stable identifier used in logs.
    fn id(&self) -> &str;

    fn series(&self) -> Vec<SeriesDescriptor>;

    fn start(&mut self, writer: SeriesWriter) -> Result<(), SourceError>;

    fn stop(&mut self) -> Result<(), SourceError>;
}
