//! Commit timing sink for instrumented workloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SeriesWriter;
use crate::telemetry::{PROFILER_ACTUAL, PROFILER_COMMIT};

/// Phase of a reported render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPhase {
    Mount,
    Update,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitPhase::Mount => write!(f, "mount"),
            CommitPhase::Update => write!(f, "update"),
        }
    }
}

/// Timing report emitted by the workload for every committed pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitObservation {
    pub phase: CommitPhase,
    pub actual_duration_ms: f64,
    pub base_duration_ms: f64,
    pub start_ts: f64,
    pub commit_ts: f64,
}

/// Turns commit observations into `profiler.actual` / `profiler.commit` points.
#[derive(Clone)]
pub struct ProfilerSink {
    writer: SeriesWriter,
}

impl ProfilerSink {
    pub fn new(writer: SeriesWriter) -> Self {
        ProfilerSink { writer }
    }

    pub fn now(&self) -> f64 {
        self.writer.now()
    }

    pub fn record(&self, obs: CommitObservation) {
        self.writer.push(PROFILER_ACTUAL, obs.commit_ts, obs.actual_duration_ms);
        self.writer
            .push(PROFILER_COMMIT, obs.commit_ts, obs.commit_ts - obs.start_ts);
        log::trace!(
            "[PROFILER] {} actual={:.3}ms base={:.3}ms",
            obs.phase,
            obs.actual_duration_ms,
            obs.base_duration_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::clock::ManualClock;
    use crate::telemetry::store::SeriesStore;
    use std::sync::Arc;

    #[test]
    fn test_record_pushes_actual_and_commit() {
        let store = Arc::new(SeriesStore::new(10));
        let sink = ProfilerSink::new(SeriesWriter::new(store.clone(), Arc::new(ManualClock::new(0.0))));

        sink.record(CommitObservation {
            phase: CommitPhase::Update,
            actual_duration_ms: 3.5,
            base_duration_ms: 7.0,
            start_ts: 100.0,
            commit_ts: 104.0,
        });
        store.commit_dirty();

        let actual = store.latest(PROFILER_ACTUAL).unwrap();
        assert_eq!(actual.t, 104.0);
        assert_eq!(actual.v.as_number(), Some(3.5));
        assert_eq!(store.latest(PROFILER_COMMIT).unwrap().v.as_number(), Some(4.0));
    }
}
