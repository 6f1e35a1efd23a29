//! Real-time telemetry pipeline.
//!
//! # Module Structure
//!
//! - `clock`: monotonic millisecond timestamps
//! - `store`: bounded per-key series with lazily materialized snapshots
//! - `notifier`: once-per-tick batched change notification
//! - `statistics`: rolling aggregates and closed-run summaries
//! - `engine`: sampling source registry
//! - `sources`: frame cadence, memory and workload commit sources
//!
//! # Data Flow
//!
//! 1. Sources and the workload push points into the `SeriesStore`
//! 2. The `ChangeNotifier` commits dirty snapshots once per refresh tick
//! 3. Subscribers read snapshots and compute statistics on demand
//!
//! `Telemetry` bundles one of each so independent pipelines can coexist.

pub mod clock;
pub mod engine;
pub mod notifier;
pub mod sources;
pub mod statistics;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::MetricsEngine;
pub use notifier::{ChangeNotifier, SubscriberId};
pub use statistics::{
    jank_counts, rolling_stats, summarize, summarize_run, ClosedWindow, JankCounts, RollingStats,
    RunSummary, RunWindow, Summary,
};
pub use store::{Point, SeriesStore, Snapshot, Value};

use crate::config::RuntimeOptions;
use sources::{FrameSource, MemorySource, ProfilerSink, SeriesWriter};

pub const FPS_FRAME: &str = "fps.frame";
pub const FPS_VALUE: &str = "fps.value";
pub const PROFILER_ACTUAL: &str = "profiler.actual";
pub const PROFILER_COMMIT: &str = "profiler.commit";
pub const MEMORY_RSS_BYTES: &str = "memory.rss.bytes";
pub const MEMORY_RSS_MB: &str = "memory.rss.mb";
pub const MEMORY_SYSTEM_USED_MB: &str = "memory.system.used_mb";
pub const MEMORY_SYSTEM_TOTAL_MB: &str = "memory.system.total_mb";

/// One complete pipeline: clock, store, notifier and source engine.
#[derive(Clone)]
pub struct Telemetry {
    options: RuntimeOptions,
    clock: Arc<dyn Clock>,
    store: Arc<SeriesStore>,
    notifier: Arc<ChangeNotifier>,
    engine: Arc<MetricsEngine>,
}

impl Telemetry {
    /// Pipeline on the process monotonic clock, with no sources registered.
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_clock(options, Arc::new(MonotonicClock::process()))
    }

    pub fn with_clock(options: RuntimeOptions, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(SeriesStore::new(options.series_capacity));
        let notifier = Arc::new(ChangeNotifier::new(store.clone()));
        let engine = Arc::new(MetricsEngine::new(store.clone(), clock.clone()));
        Telemetry {
            options,
            clock,
            store,
            notifier,
            engine,
        }
    }

    /// Register the built-in frame and memory sources.
    pub fn register_default_sources(&self) {
        self.engine
            .register(Box::new(FrameSource::new(self.options.refresh_period())));
        self.engine
            .register(Box::new(MemorySource::with_sysinfo(self.options.memory_interval())));
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn engine(&self) -> &Arc<MetricsEngine> {
        &self.engine
    }

    pub fn writer(&self) -> SeriesWriter {
        SeriesWriter::new(self.store.clone(), self.clock.clone())
    }

    pub fn profiler_sink(&self) -> ProfilerSink {
        ProfilerSink::new(self.writer())
    }

    pub fn refresh_period(&self) -> Duration {
        self.options.refresh_period()
    }

    pub fn get_series(&self, key: &str) -> Snapshot {
        self.store.get_series(key)
    }

    pub fn latest(&self, key: &str) -> Option<Point> {
        self.store.latest(key)
    }

    /// Register a change callback and make sure the tick loop is running.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.notifier.subscribe(callback);
        self.ensure_ticking();
        id
    }

    /// Start the notifier tick loop if it is not running yet, so committed
    /// snapshots stay current with or without subscribers.
    pub fn ensure_ticking(&self) -> bool {
        self.notifier.ensure_started(self.options.refresh_period())
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Rolling aggregates of one series over the trailing `window_ms`.
    pub fn rolling_stats(&self, key: &str, window_ms: f64) -> RollingStats {
        rolling_stats(&self.store.get_snapshot(key), self.now(), window_ms)
    }

    /// Force one notifier flush outside the tick loop.
    pub fn flush(&self) -> bool {
        self.notifier.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_stats_uses_pipeline_clock() {
        let clock = Arc::new(ManualClock::new(0.0));
        let telemetry = Telemetry::with_clock(RuntimeOptions::default(), clock.clone());

        for i in 0..10 {
            telemetry.store().push(FPS_FRAME, i as f64 * 100.0, 16.0 + i as f64);
        }
        assert!(telemetry.flush());

        clock.set(900.0);
        let stats = telemetry.rolling_stats(FPS_FRAME, 250.0);
        assert_eq!(stats.n, 3);
        assert_eq!(stats.max, Some(25.0));
        assert_eq!(telemetry.latest(FPS_FRAME).map(|p| p.t), Some(900.0));
    }

    #[test]
    fn test_default_sources_registered() {
        let telemetry = Telemetry::new(RuntimeOptions::default());
        telemetry.register_default_sources();
        assert_eq!(
            telemetry.engine().source_ids(),
            vec!["fps".to_string(), "memory".to_string()]
        );
        assert_eq!(telemetry.engine().descriptors().len(), 6);
    }
}
