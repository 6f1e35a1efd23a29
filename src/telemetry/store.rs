//! Bounded multi-series time-series store.
//!
//! Each series is a FIFO ring of `Point`s capped at the store capacity. Reads
//! go through immutable `Snapshot`s that are only re-materialized by
//! `commit_dirty` for series that received points since the previous commit,
//! so `Snapshot::ptr_eq` tells a reader whether a series changed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, RwLock};

use crate::config::DEFAULT_SERIES_CAPACITY;

/// Sample payload: a number, or an arbitrary structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Structured(serde_json::Value),
}

impl Value {
    /// The raw number for `Number` values (finite or not).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Structured(_) => None,
        }
    }

    /// Best-effort numeric coercion: numbers, booleans and numeric strings.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Structured(json) => match json {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Structured(json)
    }
}

/// One timestamped sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Monotonic milliseconds
    pub t: f64,
    pub v: Value,
}

impl Point {
    pub fn new(t: f64, v: impl Into<Value>) -> Self {
        Point { t, v: v.into() }
    }
}

/// Immutable, cheaply clonable view of a series.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[Point]>);

impl Snapshot {
    fn empty() -> Self {
        Snapshot(Arc::from(Vec::new()))
    }

    /// True when both handles view the same materialization.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

impl Deref for Snapshot {
    type Target = [Point];

    fn deref(&self) -> &[Point] {
        &self.0
    }
}

struct SeriesSlot {
    data: VecDeque<Point>,
    snapshot: Snapshot,
}

struct StoreInner {
    series: HashMap<String, SeriesSlot>,
    dirty: HashSet<String>,
}

/// Process-wide series storage shared by sources, the notifier and readers.
pub struct SeriesStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
    empty: Snapshot,
}

impl SeriesStore {
    /// Create a store holding at most `capacity` points per series (at least 1).
    pub fn new(capacity: usize) -> Self {
        let empty = Snapshot::empty();
        SeriesStore {
            inner: RwLock::new(StoreInner {
                series: HashMap::new(),
                dirty: HashSet::new(),
            }),
            capacity: capacity.max(1),
            empty,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a point, evicting the oldest on overflow, and mark the series dirty.
    ///
    /// Values are stored as given; non-finite or structured values are
    /// filtered later by the statistics functions.
    pub fn push(&self, key: &str, t: f64, v: impl Into<Value>) {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let empty = &self.empty;
        let slot = inner
            .series
            .entry(key.to_string())
            .or_insert_with(|| SeriesSlot {
                data: VecDeque::new(),
                snapshot: empty.clone(),
            });

        slot.data.push_back(Point::new(t, v));
        while slot.data.len() > self.capacity {
            slot.data.pop_front();
        }

        if !inner.dirty.contains(key) {
            inner.dirty.insert(key.to_string());
        }
    }

    /// Current snapshot of a series; the shared empty snapshot for unknown keys.
    ///
    /// Points pushed since the last `commit_dirty` are not visible yet.
    pub fn get_snapshot(&self, key: &str) -> Snapshot {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner
            .series
            .get(key)
            .map(|slot| slot.snapshot.clone())
            .unwrap_or_else(|| self.empty.clone())
    }

    /// Alias of `get_snapshot` for the read API.
    pub fn get_series(&self, key: &str) -> Snapshot {
        self.get_snapshot(key)
    }

    /// Newest committed point of a series.
    pub fn latest(&self, key: &str) -> Option<Point> {
        self.get_snapshot(key).last().cloned()
    }

    /// Keys of every series ever pushed, sorted.
    pub fn series_keys(&self) -> Vec<String> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut keys: Vec<String> = inner.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn has_dirty(&self) -> bool {
        match self.inner.read() {
            Ok(guard) => !guard.dirty.is_empty(),
            Err(poisoned) => !poisoned.into_inner().dirty.is_empty(),
        }
    }

    /// Re-materialize snapshots for dirty series only.
    ///
    /// Returns the number of series committed; 0 means nothing changed.
    pub fn commit_dirty(&self) -> usize {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.dirty.is_empty() {
            return 0;
        }

        let StoreInner { series, dirty } = &mut *inner;
        let mut committed = 0;
        for key in dirty.drain() {
            if let Some(slot) = series.get_mut(&key) {
                let points: Vec<Point> = slot.data.iter().cloned().collect();
                slot.snapshot = Snapshot(Arc::from(points));
                committed += 1;
            }
        }

        log::trace!("[STORE] Committed {} dirty series", committed);
        committed
    }
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}
