//! Rolling and closed-window statistics over series snapshots.
//!
//! Every function here is pure: same points in, bit-identical numbers out.

use serde::{Deserialize, Serialize};

use super::store::{Point, SeriesStore};
use super::{FPS_FRAME, FPS_VALUE, MEMORY_RSS_MB, PROFILER_ACTUAL, PROFILER_COMMIT};

/// Frame-duration threshold for a dropped frame at 60 Hz.
pub const JANK_16_MS: f64 = 16.7;
/// Frame-duration threshold for two or more dropped frames.
pub const JANK_33_MS: f64 = 33.0;

/// Aggregates over a trailing time window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RollingStats {
    pub n: usize,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Average, min and max of numeric points with `t >= now - window_ms`.
///
/// Walks backward from the newest point and stops at the first point older
/// than the window, so cost is proportional to the window, not the series.
/// Structured and non-finite values are skipped.
pub fn rolling_stats(points: &[Point], now: f64, window_ms: f64) -> RollingStats {
    let cutoff = now - window_ms;
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for point in points.iter().rev() {
        if point.t < cutoff {
            break;
        }
        let value = match point.v.as_number() {
            Some(v) if v.is_finite() => v,
            _ => continue,
        };
        n += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    if n == 0 {
        return RollingStats::default();
    }

    RollingStats {
        n,
        avg: Some(sum / n as f64),
        min: Some(min),
        max: Some(max),
    }
}

/// Run time window. `end` is `None` while the run is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunWindow {
    pub start: f64,
    pub end: Option<f64>,
}

impl RunWindow {
    pub fn open(start: f64) -> Self {
        RunWindow { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn close(&mut self, end: f64) {
        if self.end.is_none() {
            self.end = Some(end);
        }
    }

    /// The closed form, or `None` while the run is still open.
    pub fn closed(&self) -> Option<ClosedWindow> {
        self.end.map(|end| ClosedWindow {
            start: self.start,
            end,
        })
    }
}

/// Inclusive `[start, end]` window of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosedWindow {
    pub start: f64,
    pub end: f64,
}

impl ClosedWindow {
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn duration_ms(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Closed-window distribution summary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub avg: Option<f64>,
    pub p95: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

fn window_values(points: &[Point], window: &ClosedWindow) -> Vec<f64> {
    points
        .iter()
        .filter(|p| window.contains(p.t))
        .filter_map(|p| p.v.coerce_number())
        .filter(|v| v.is_finite())
        .collect()
}

/// Nearest-rank p95 index: `floor(0.95 * (count - 1))`, clamped.
pub fn p95_index(count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let idx = (0.95 * (count - 1) as f64).floor() as usize;
    idx.min(count - 1)
}

/// Count, average, p95, min and max of the window's numeric values.
pub fn summarize(points: &[Point], window: &ClosedWindow) -> Summary {
    let mut values = window_values(points, window);
    if values.is_empty() {
        return Summary::default();
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();
    let sum: f64 = values.iter().sum();

    Summary {
        count,
        avg: Some(sum / count as f64),
        p95: Some(values[p95_index(count)]),
        min: Some(values[0]),
        max: Some(values[count - 1]),
    }
}

/// Frames slower than the jank thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JankCounts {
    pub over_16ms: usize,
    pub over_33ms: usize,
}

/// Count frame durations strictly above 16.7 ms and 33 ms.
pub fn jank_counts(points: &[Point], window: &ClosedWindow) -> JankCounts {
    window_values(points, window)
        .into_iter()
        .fold(JankCounts::default(), |mut counts, v| {
            if v > JANK_16_MS {
                counts.over_16ms += 1;
            }
            if v > JANK_33_MS {
                counts.over_33ms += 1;
            }
            counts
        })
}

/// Everything reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub window: Option<ClosedWindow>,
    pub frame_ms: Summary,
    pub fps: Summary,
    pub commit_ms: Summary,
    pub actual_ms: Summary,
    pub memory_mb: Summary,
    pub jank: JankCounts,
}

/// Summarize the standard series over a closed window.
///
/// Reads committed snapshots; callers flush the notifier (or call
/// `SeriesStore::commit_dirty`) first to include the newest points.
pub fn summarize_run(store: &SeriesStore, window: &ClosedWindow) -> RunSummary {
    let frames = store.get_snapshot(FPS_FRAME);
    RunSummary {
        window: Some(*window),
        frame_ms: summarize(&frames, window),
        fps: summarize(&store.get_snapshot(FPS_VALUE), window),
        commit_ms: summarize(&store.get_snapshot(PROFILER_COMMIT), window),
        actual_ms: summarize(&store.get_snapshot(PROFILER_ACTUAL), window),
        memory_mb: summarize(&store.get_snapshot(MEMORY_RSS_MB), window),
        jank: jank_counts(&frames, window),
    }
}
