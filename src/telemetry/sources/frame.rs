//! Frame cadence source.
//!
//! Ticks on the refresh period and records the observed gap between ticks as
//! the frame duration. A stalled runtime shows up as long frames, which is
//! what the jank counts measure.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SamplingSource, SeriesDescriptor, SeriesWriter};
use crate::error::SourceError;
use crate::telemetry::{FPS_FRAME, FPS_VALUE};

pub struct FrameSource {
    period: Duration,
    task: Option<JoinHandle<()>>,
    last: Arc<Mutex<Option<f64>>>,
}

impl FrameSource {
    pub fn new(period: Duration) -> Self {
        FrameSource {
            period: period.max(Duration::from_millis(1)),
            task: None,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Record one frame boundary at `now`. The first call only primes.
    fn on_frame(writer: &SeriesWriter, last: &Mutex<Option<f64>>, now: f64) {
        let mut prev = match last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev_t) = *prev {
            let dt = now - prev_t;
            writer.push(FPS_FRAME, now, dt);
            if dt > 0.0 {
                writer.push(FPS_VALUE, now, 1000.0 / dt);
            }
        }
        *prev = Some(now);
    }
}

impl SamplingSource for FrameSource {
    fn id(&self) -> &str {
        "fps"
    }

    fn series(&self) -> Vec<SeriesDescriptor> {
        vec![
            SeriesDescriptor::new(FPS_FRAME, "ms"),
            SeriesDescriptor::new(FPS_VALUE, "fps"),
        ]
    }

    fn start(&mut self, writer: SeriesWriter) -> Result<(), SourceError> {
        if self.task.is_some() {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| SourceError::NoRuntime(self.id().to_string()))?;

        let period = self.period;
        let last = self.last.clone();
        self.task = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                FrameSource::on_frame(&writer, &last, writer.now());
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
        Ok(())
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::clock::{ManualClock, MonotonicClock};
    use crate::telemetry::store::SeriesStore;

    #[test]
    fn test_first_frame_only_primes() {
        let store = Arc::new(SeriesStore::new(100));
        let clock = Arc::new(ManualClock::new(0.0));
        let writer = SeriesWriter::new(store.clone(), clock);
        let last = Mutex::new(None);

        FrameSource::on_frame(&writer, &last, 100.0);
        store.commit_dirty();
        assert!(store.get_snapshot(FPS_FRAME).is_empty());

        FrameSource::on_frame(&writer, &last, 120.0);
        store.commit_dirty();
        assert_eq!(store.latest(FPS_FRAME).unwrap().v.as_number(), Some(20.0));
        assert_eq!(store.latest(FPS_VALUE).unwrap().v.as_number(), Some(50.0));
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let store = Arc::new(SeriesStore::new(100));
        let writer = SeriesWriter::new(store, Arc::new(ManualClock::new(0.0)));
        let mut source = FrameSource::new(Duration::from_millis(16));
        assert_eq!(
            source.start(writer),
            Err(SourceError::NoRuntime("fps".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_follow_refresh_period() {
        let store = Arc::new(SeriesStore::new(100));
        let writer = SeriesWriter::new(store.clone(), Arc::new(MonotonicClock::starting_now()));
        let mut source = FrameSource::new(Duration::from_millis(16));

        source.start(writer).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        source.stop().unwrap();

        store.commit_dirty();
        let frames = store.get_snapshot(FPS_FRAME);
        assert!(frames.len() >= 5, "expected several frames, got {}", frames.len());
        for point in frames.iter() {
            let dt = point.v.as_number().unwrap();
            assert!((dt - 16.0).abs() < 1e-6, "unexpected frame gap {}", dt);
        }

        let count = frames.len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.commit_dirty();
        assert_eq!(store.get_snapshot(FPS_FRAME).len(), count, "no frames after stop");
    }
}
