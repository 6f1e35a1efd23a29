//! Run orchestration.
//!
//! `start` opens a `RunWindow`, mounts the workload, starts the sampling
//! sources and the scheduler, and arms the auto-stop timer. `stop` closes the
//! window and tears everything down in reverse. Both are no-ops in the wrong
//! state, and dropping the controller stops a live run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::state::{RunState, StopReason};
use crate::models::Scenario;
use crate::telemetry::{summarize_run, ClosedWindow, RunSummary, RunWindow, Telemetry};
use crate::workload::{MountedWorkload, WorkloadFactory, WorkloadScheduler, WorkloadStats};

struct RunInner {
    state: RunState,
    window: Option<RunWindow>,
    scenario: Option<Scenario>,
    mount: Option<Box<dyn MountedWorkload>>,
    last_stats: Option<WorkloadStats>,
    stop_reason: Option<StopReason>,
    auto_stop: Option<JoinHandle<()>>,
}

pub struct RunController {
    telemetry: Telemetry,
    factory: Arc<dyn WorkloadFactory>,
    scheduler: WorkloadScheduler,
    inner: Mutex<RunInner>,
    generation: AtomicU64,
}

impl RunController {
    pub fn new(telemetry: Telemetry, factory: Arc<dyn WorkloadFactory>) -> Arc<Self> {
        Arc::new(RunController {
            telemetry,
            factory,
            scheduler: WorkloadScheduler::new(),
            inner: Mutex::new(RunInner {
                state: RunState::Idle,
                window: None,
                scenario: None,
                mount: None,
                last_stats: None,
                stop_reason: None,
                auto_stop: None,
            }),
            generation: AtomicU64::new(0),
        })
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, RunInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn scheduler(&self) -> &WorkloadScheduler {
        &self.scheduler
    }

    /// Begin a run. Returns false (and changes nothing) when already running.
    pub fn start(self: &Arc<Self>, scenario: &Scenario) -> bool {
        let mut inner = self.lock_inner();
        if inner.state.is_running() {
            log::debug!("[RUN] Start ignored: run already active");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.telemetry.now();
        inner.window = Some(RunWindow::open(now));
        inner.scenario = Some(scenario.clone());
        inner.stop_reason = None;
        inner.last_stats = None;

        let mount = self
            .factory
            .mount(scenario, self.telemetry.profiler_sink());
        self.telemetry.engine().start_all();
        self.telemetry.ensure_ticking();
        let timers = self.scheduler.start(scenario, mount.as_ref());
        inner.mount = Some(mount);
        inner.state = RunState::Running;

        if scenario.duration_sec > 0 {
            inner.auto_stop = self.arm_auto_stop(Duration::from_secs(scenario.duration_sec), generation);
        }

        log::info!(
            "[RUN] Run #{} started at {:.1}ms ({} channel timer(s), duration {}s)",
            generation,
            now,
            timers,
            scenario.duration_sec
        );
        true
    }

    fn arm_auto_stop(self: &Arc<Self>, after: Duration, generation: u64) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("[RUN] No tokio runtime; auto-stop timer not armed");
                return None;
            }
        };

        let weak: Weak<RunController> = Arc::downgrade(self);
        Some(handle.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(controller) = weak.upgrade() {
                if controller.generation.load(Ordering::SeqCst) == generation {
                    controller.stop_with(StopReason::DurationElapsed);
                }
            }
        }))
    }

    /// End the active run. Returns false when idle.
    pub fn stop(&self) -> bool {
        self.stop_with(StopReason::Requested)
    }

    fn stop_with(&self, reason: StopReason) -> bool {
        let mut inner = self.lock_inner();
        if !inner.state.is_running() {
            return false;
        }

        let now = self.telemetry.now();
        if let Some(window) = inner.window.as_mut() {
            window.close(now);
        }

        if let Some(timer) = inner.auto_stop.take() {
            // May be the calling task.
            timer.abort();
        }

        self.scheduler.stop();
        self.telemetry.engine().stop_all();

        if let Some(mount) = inner.mount.take() {
            inner.last_stats = Some(mount.stats());
            mount.unmount();
        }

        inner.state = RunState::Idle;
        inner.stop_reason = Some(reason);
        log::info!("[RUN] Run stopped at {:.1}ms ({})", now, reason);
        true
    }

    pub fn state(&self) -> RunState {
        self.lock_inner().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Current window (open while running) or the last closed one.
    pub fn window(&self) -> Option<RunWindow> {
        self.lock_inner().window
    }

    /// Closed window of the most recent finished run.
    pub fn last_window(&self) -> Option<ClosedWindow> {
        self.lock_inner().window.and_then(|w| w.closed())
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.lock_inner().stop_reason
    }

    pub fn scenario(&self) -> Option<Scenario> {
        self.lock_inner().scenario.clone()
    }

    /// Live workload counters while running, final counters after stop.
    pub fn workload_stats(&self) -> Option<WorkloadStats> {
        let inner = self.lock_inner();
        match inner.mount.as_ref() {
            Some(mount) => Some(mount.stats()),
            None => inner.last_stats,
        }
    }

    /// Summary of the last closed run, after committing pending points.
    ///
    /// Commits the store directly: a notifier flush may already be in progress
    /// (for example when called from a subscriber) and would be skipped.
    pub fn summary(&self) -> Option<RunSummary> {
        let window = self.last_window()?;
        self.telemetry.store().commit_dirty();
        Some(summarize_run(self.telemetry.store(), &window))
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.stop_with(StopReason::Teardown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeOptions;
    use crate::telemetry::{ManualClock, PROFILER_ACTUAL};
    use crate::workload::SyntheticFactory;

    fn controller(clock: Arc<ManualClock>) -> Arc<RunController> {
        let telemetry = Telemetry::with_clock(RuntimeOptions::default(), clock);
        RunController::new(telemetry, Arc::new(SyntheticFactory))
    }

    #[test]
    fn test_stop_before_start_does_nothing() {
        let controller = controller(Arc::new(ManualClock::new(0.0)));
        assert!(!controller.stop());
        assert!(controller.window().is_none());
        assert!(controller.summary().is_none());
    }

    #[tokio::test]
    async fn test_double_start_keeps_one_window() {
        let clock = Arc::new(ManualClock::new(10.0));
        let controller = controller(clock.clone());
        let mut scenario = Scenario::default();
        scenario.duration_sec = 0;

        assert!(controller.start(&scenario));
        clock.set(20.0);
        assert!(!controller.start(&scenario));
        assert_eq!(controller.window(), Some(RunWindow::open(10.0)));

        clock.set(30.0);
        assert!(controller.stop());
        assert!(!controller.stop());
        assert_eq!(
            controller.last_window(),
            Some(ClosedWindow { start: 10.0, end: 30.0 })
        );
        assert_eq!(controller.stop_reason(), Some(StopReason::Requested));
        assert!(controller.scheduler().active_timers().is_empty());
    }

    #[tokio::test]
    async fn test_start_runs_notifier_without_subscribers() {
        let controller = controller(Arc::new(ManualClock::new(0.0)));
        assert!(!controller.telemetry().notifier().is_started());

        let mut scenario = Scenario::default();
        scenario.duration_sec = 0;
        controller.start(&scenario);
        assert!(controller.telemetry().notifier().is_started());
        assert_eq!(controller.telemetry().notifier().subscriber_count(), 0);
        controller.stop();
    }

    #[tokio::test]
    async fn test_summary_from_inside_a_flush_sees_pending_points() {
        let clock = Arc::new(ManualClock::new(10.0));
        let controller = controller(clock.clone());
        let mut scenario = Scenario::default();
        scenario.duration_sec = 0;

        controller.start(&scenario);
        clock.set(30.0);
        controller.stop();

        let telemetry = controller.telemetry().clone();
        let store = telemetry.store().clone();
        let weak = Arc::downgrade(&controller);
        let counts = Arc::new(Mutex::new(Vec::new()));
        let seen = counts.clone();
        let id = telemetry.subscribe(move || {
            // Lands while the notifier is mid-flush.
            store.push(PROFILER_ACTUAL, 20.0, 1.5);
            if let Some(controller) = weak.upgrade() {
                if let Some(summary) = controller.summary() {
                    seen.lock().unwrap().push(summary.actual_ms.count);
                }
            }
        });

        telemetry.store().push("trigger", 25.0, 1.0);
        assert!(telemetry.flush());
        telemetry.unsubscribe(id);

        // Mount pass plus the point pushed during the flush.
        assert_eq!(*counts.lock().unwrap(), vec![2]);
    }
}
