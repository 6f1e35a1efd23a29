//! Process and system memory source.
//!
//! Samples roughly once per interval, with one sample kicked off immediately
//! on start. Measurement is asynchronous: a tick that lands while a previous
//! measurement is still outstanding is dropped, and a measurement that
//! completes after `stop` is discarded.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SamplingSource, SeriesDescriptor, SeriesWriter};
use crate::error::SourceError;
use crate::telemetry::{MEMORY_RSS_BYTES, MEMORY_RSS_MB, MEMORY_SYSTEM_TOTAL_MB, MEMORY_SYSTEM_USED_MB};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One memory measurement, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub rss_bytes: u64,
    pub system_used_bytes: u64,
    pub system_total_bytes: u64,
}

/// Asynchronous memory measurement. `None` means "no reading this time".
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> BoxFuture<'static, Option<MemoryReading>>;
}

/// Reads this process's resident set and system memory through `sysinfo`.
pub struct SysinfoProbe {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::warn!("[MEMORY] Cannot resolve current pid: {}", e);
                None
            }
        };
        SysinfoProbe {
            system: Arc::new(Mutex::new(System::new())),
            pid,
        }
    }

    fn read(system: &Mutex<System>, pid: Option<Pid>) -> Option<MemoryReading> {
        let mut sys = system.lock().ok()?;
        sys.refresh_memory();

        let rss_bytes = match pid {
            Some(pid) => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            None => 0,
        };

        Some(MemoryReading {
            rss_bytes,
            system_used_bytes: sys.used_memory(),
            system_total_bytes: sys.total_memory(),
        })
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn sample(&self) -> BoxFuture<'static, Option<MemoryReading>> {
        let system = self.system.clone();
        let pid = self.pid;
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || SysinfoProbe::read(&system, pid)).await {
                Ok(reading) => reading,
                Err(e) => {
                    log::warn!("[MEMORY] Memory probe task failed: {}", e);
                    None
                }
            }
        })
    }
}

/// Per-start sampling state shared with in-flight measurements.
struct MemorySampler {
    writer: SeriesWriter,
    probe: Arc<dyn MemoryProbe>,
    stopped: AtomicBool,
    in_flight: AtomicBool,
}

impl MemorySampler {
    /// Kick one measurement. Returns false when stopped or already in flight.
    fn trigger(self: &Arc<Self>) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            log::trace!("[MEMORY] Sample still in flight, skipping tick");
            return false;
        }

        // Stamped at the tick, not at completion.
        let t = self.writer.now();
        let sampler = Arc::clone(self);
        let future = self.probe.sample();
        tokio::spawn(async move {
            let reading = future.await;
            sampler.in_flight.store(false, Ordering::SeqCst);
            if sampler.stopped.load(Ordering::SeqCst) {
                return;
            }
            if let Some(reading) = reading {
                sampler.record(t, reading);
            }
        });
        true
    }

    fn record(&self, t: f64, reading: MemoryReading) {
        self.writer.push(MEMORY_RSS_BYTES, t, reading.rss_bytes as f64);
        self.writer
            .push(MEMORY_RSS_MB, t, reading.rss_bytes as f64 / BYTES_PER_MB);
        self.writer.push(
            MEMORY_SYSTEM_USED_MB,
            t,
            reading.system_used_bytes as f64 / BYTES_PER_MB,
        );
        self.writer.push(
            MEMORY_SYSTEM_TOTAL_MB,
            t,
            reading.system_total_bytes as f64 / BYTES_PER_MB,
        );
    }
}

pub struct MemorySource {
    probe: Arc<dyn MemoryProbe>,
    interval: Duration,
    sampler: Option<Arc<MemorySampler>>,
    task: Option<JoinHandle<()>>,
}

impl MemorySource {
    pub fn new(probe: Arc<dyn MemoryProbe>, interval: Duration) -> Self {
        MemorySource {
            probe,
            interval: interval.max(Duration::from_millis(1)),
            sampler: None,
            task: None,
        }
    }

    /// Memory source backed by `SysinfoProbe`.
    pub fn with_sysinfo(interval: Duration) -> Self {
        Self::new(Arc::new(SysinfoProbe::new()), interval)
    }

    fn halt(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stopped.store(true, Ordering::SeqCst);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl SamplingSource for MemorySource {
    fn id(&self) -> &str {
        "memory"
    }

    fn series(&self) -> Vec<SeriesDescriptor> {
        vec![
            SeriesDescriptor::new(MEMORY_RSS_BYTES, "bytes"),
            SeriesDescriptor::new(MEMORY_RSS_MB, "MB"),
            SeriesDescriptor::new(MEMORY_SYSTEM_USED_MB, "MB"),
            SeriesDescriptor::new(MEMORY_SYSTEM_TOTAL_MB, "MB"),
        ]
    }

    fn start(&mut self, writer: SeriesWriter) -> Result<(), SourceError> {
        if self.task.is_some() {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| SourceError::NoRuntime(self.id().to_string()))?;

        let sampler = Arc::new(MemorySampler {
            writer,
            probe: self.probe.clone(),
            stopped: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
        });

        let period = self.interval;
        let looped = sampler.clone();
        self.task = Some(handle.spawn(async move {
            // First tick completes immediately.
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                looped.trigger();
            }
        }));
        self.sampler = Some(sampler);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.halt();
        Ok(())
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.halt();
    }
}
