//! Immediate and deferred dispatch lanes.

use std::sync::atomic::{AtomicU64, Ordering};

use super::Update;

/// Submission lanes offered by an instrumented workload.
pub trait DispatchLanes: Send + Sync {
    /// Run the update as part of the current tick.
    fn submit_immediate(&self, update: Update);

    /// Run the update at lower priority, after the current tick yields.
    fn submit_deferred(&self, update: Update);
}

/// Lanes on the tokio runtime: immediate runs inline, deferred is spawned and
/// yields once before running.
#[derive(Debug, Default)]
pub struct TokioLanes {
    immediate: AtomicU64,
    deferred: AtomicU64,
}

impl TokioLanes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate_count(&self) -> u64 {
        self.immediate.load(Ordering::Relaxed)
    }

    pub fn deferred_count(&self) -> u64 {
        self.deferred.load(Ordering::Relaxed)
    }
}

impl DispatchLanes for TokioLanes {
    fn submit_immediate(&self, update: Update) {
        self.immediate.fetch_add(1, Ordering::Relaxed);
        update();
    }

    fn submit_deferred(&self, update: Update) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    update();
                });
            }
            Err(_) => {
                log::warn!("[LANES] No tokio runtime; running deferred update inline");
                update();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_immediate_runs_inline() {
        let lanes = TokioLanes::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        lanes.submit_immediate(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(lanes.immediate_count(), 1);
        assert_eq!(lanes.deferred_count(), 0);
    }

    #[tokio::test]
    async fn test_deferred_runs_after_yield() {
        let lanes = TokioLanes::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        lanes.submit_deferred(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0, "deferred must not run inline");

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(lanes.deferred_count(), 1);
    }
}
