//! Sampling source registry.
//!
//! `start_all` / `stop_all` are idempotent and pair up: every registered
//! source is started once per start/stop cycle and stopped once. A source that
//! errors or panics is logged and skipped; the rest carry on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::clock::Clock;
use super::sources::{SamplingSource, SeriesDescriptor, SeriesWriter};
use super::store::SeriesStore;
use crate::error::SourceError;

pub struct MetricsEngine {
    store: Arc<SeriesStore>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Vec<Box<dyn SamplingSource>>>,
    started: AtomicBool,
}

impl MetricsEngine {
    pub fn new(store: Arc<SeriesStore>, clock: Arc<dyn Clock>) -> Self {
        MetricsEngine {
            store,
            clock,
            registry: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Add a source. A source registered while the engine is running is
    /// started on the next `start_all` cycle.
    pub fn register(&self, source: Box<dyn SamplingSource>) {
        log::debug!("[ENGINE] Registered sampling source '{}'", source.id());
        match self.registry.lock() {
            Ok(mut registry) => registry.push(source),
            Err(poisoned) => poisoned.into_inner().push(source),
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        match self.registry.lock() {
            Ok(registry) => registry.iter().map(|s| s.id().to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Series declared by every registered source.
    pub fn descriptors(&self) -> Vec<SeriesDescriptor> {
        match self.registry.lock() {
            Ok(registry) => registry.iter().flat_map(|s| s.series()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn start_all(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let writer = SeriesWriter::new(self.store.clone(), self.clock.clone());
        let mut registry = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for source in registry.iter_mut() {
            let id = source.id().to_string();
            let writer = writer.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| source.start(writer)));
            report_outcome("start", &id, outcome);
        }
        log::info!("[ENGINE] Started {} sampling source(s)", registry.len());
    }

    pub fn stop_all(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut registry = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for source in registry.iter_mut() {
            let id = source.id().to_string();
            let outcome = catch_unwind(AssertUnwindSafe(|| source.stop()));
            report_outcome("stop", &id, outcome);
        }
        log::info!("[ENGINE] Stopped {} sampling source(s)", registry.len());
    }
}

fn report_outcome(
    action: &str,
    id: &str,
    outcome: std::thread::Result<Result<(), SourceError>>,
) {
    match outcome {
        Ok(Ok(())) => log::debug!("[ENGINE] {} '{}' ok", action, id),
        Ok(Err(e)) => log::warn!("[ENGINE] Failed to {} source '{}': {}", action, id, e),
        Err(_) => log::error!("[ENGINE] Source '{}' panicked during {}", id, action),
    }
}
