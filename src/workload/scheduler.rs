//! Periodic update channels with probabilistic lane selection.
//!
//! Each enabled channel owns one timer with period `max(1ms, floor(1000/hz))`.
//! On every tick the channel's update action goes to the deferred lane with
//! probability `transition_ratio`, otherwise to the immediate lane. The RNG
//! is shared by all channels of one start cycle and can be seeded for
//! reproducible lane sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::lanes::DispatchLanes;
use super::{MountedWorkload, UpdateAction};
use crate::models::{ChannelKind, Scenario};

/// Longest channel period; slower rates are clamped to it.
pub const MAX_PERIOD_MS: u64 = 24 * 60 * 60 * 1000;

/// Timer period for a channel frequency; `None` disables the channel.
pub fn period_for(hz: f64) -> Option<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    let ms = (1000.0 / hz).floor().clamp(1.0, MAX_PERIOD_MS as f64);
    Some(Duration::from_millis(ms as u64))
}

/// Which lane a tick went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Immediate,
    Deferred,
}

/// Weighted coin flip between the two lanes.
pub struct LanePolicy {
    ratio: f64,
    rng: Mutex<StdRng>,
}

impl LanePolicy {
    /// `ratio` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn new(ratio: f64, seed: Option<u64>) -> Self {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        LanePolicy {
            ratio,
            rng: Mutex::new(rng),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn choose(&self) -> Lane {
        if self.ratio <= 0.0 {
            return Lane::Immediate;
        }
        let roll: f64 = match self.rng.lock() {
            Ok(mut rng) => rng.gen(),
            Err(poisoned) => poisoned.into_inner().gen(),
        };
        if roll < self.ratio {
            Lane::Deferred
        } else {
            Lane::Immediate
        }
    }

    /// Route one invocation of `action` through the chosen lane.
    pub fn dispatch(&self, lanes: &dyn DispatchLanes, action: &UpdateAction) -> Lane {
        let lane = self.choose();
        let action = Arc::clone(action);
        let update = Box::new(move || action());
        match lane {
            Lane::Immediate => lanes.submit_immediate(update),
            Lane::Deferred => lanes.submit_deferred(update),
        }
        lane
    }
}

/// One periodic update stream.
#[derive(Clone)]
pub struct ChannelSpec {
    pub kind: ChannelKind,
    pub hz: f64,
    pub action: UpdateAction,
}

struct RunningTimers {
    cancelled: Arc<AtomicBool>,
    handles: Vec<(ChannelKind, JoinHandle<()>)>,
}

pub struct WorkloadScheduler {
    running: Mutex<Option<RunningTimers>>,
}

impl WorkloadScheduler {
    pub fn new() -> Self {
        WorkloadScheduler {
            running: Mutex::new(None),
        }
    }

    /// Channel table for a scenario, with actions from the mounted workload.
    pub fn channels_for(scenario: &Scenario, workload: &dyn MountedWorkload) -> Vec<ChannelSpec> {
        ChannelKind::ALL
            .iter()
            .map(|&kind| ChannelSpec {
                kind,
                hz: scenario.channel_hz(kind),
                action: workload.update_action(kind),
            })
            .collect()
    }

    /// Start the scenario's channels against a mounted workload.
    pub fn start(&self, scenario: &Scenario, workload: &dyn MountedWorkload) -> usize {
        let channels = Self::channels_for(scenario, workload);
        let policy = LanePolicy::new(scenario.churn.transition_ratio, scenario.seed);
        self.start_channels(channels, workload.lanes(), policy)
    }

    /// Create one timer per enabled channel. No-op while already running.
    ///
    /// Returns the number of timers created. Without a tokio runtime nothing
    /// starts and an error is logged.
    pub fn start_channels(
        &self,
        channels: Vec<ChannelSpec>,
        lanes: Arc<dyn DispatchLanes>,
        policy: LanePolicy,
    ) -> usize {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if running.is_some() {
            log::debug!("[SCHEDULER] Start ignored: already running");
            return 0;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::error!("[SCHEDULER] No tokio runtime available; channels not started");
                return 0;
            }
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let policy = Arc::new(policy);
        let mut handles = Vec::new();

        for channel in channels {
            let period = match period_for(channel.hz) {
                Some(period) => period,
                None => {
                    log::debug!("[SCHEDULER] Channel {} disabled", channel.kind);
                    continue;
                }
            };

            let cancelled = cancelled.clone();
            let policy = policy.clone();
            let lanes = lanes.clone();
            let action = channel.action;
            let task = handle.spawn(async move {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    policy.dispatch(lanes.as_ref(), &action);
                }
            });

            log::debug!(
                "[SCHEDULER] Channel {} every {}ms",
                channel.kind,
                period.as_millis()
            );
            handles.push((channel.kind, task));
        }

        let started = handles.len();
        log::info!(
            "[SCHEDULER] Started {} channel timer(s), transition ratio {:.2}",
            started,
            policy.ratio()
        );
        *running = Some(RunningTimers { cancelled, handles });
        started
    }

    /// Cancel every timer. Idempotent and safe without a prior start.
    pub fn stop(&self) {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(timers) = running.take() {
            timers.cancelled.store(true, Ordering::SeqCst);
            for (_, task) in timers.handles {
                task.abort();
            }
            log::info!("[SCHEDULER] Stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Channels with a live timer.
    pub fn active_timers(&self) -> Vec<ChannelKind> {
        match self.running.lock() {
            Ok(running) => running
                .as_ref()
                .map(|t| t.handles.iter().map(|(kind, _)| *kind).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for WorkloadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkloadScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::lanes::TokioLanes;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_period_for() {
        assert_eq!(period_for(3.0), Some(Duration::from_millis(333)));
        assert_eq!(period_for(2.0), Some(Duration::from_millis(500)));
        assert_eq!(period_for(5000.0), Some(Duration::from_millis(1)));
        assert_eq!(period_for(0.0), None);
        assert_eq!(period_for(-1.0), None);
        assert_eq!(period_for(f64::NAN), None);
        assert_eq!(period_for(f64::INFINITY), None);

        let day = Some(Duration::from_millis(MAX_PERIOD_MS));
        assert_eq!(period_for(1e-300), day);
        assert_eq!(period_for(f64::MIN_POSITIVE), day);
    }

    #[test]
    fn test_lane_policy_extremes() {
        let never = LanePolicy::new(0.0, Some(1));
        assert!((0..100).all(|_| never.choose() == Lane::Immediate));

        let always = LanePolicy::new(1.0, Some(1));
        assert!((0..100).all(|_| always.choose() == Lane::Deferred));

        assert_eq!(LanePolicy::new(7.0, None).ratio(), 1.0);
        assert_eq!(LanePolicy::new(f64::NAN, None).ratio(), 0.0);
    }

    #[test]
    fn test_seeded_policy_is_reproducible() {
        let a = LanePolicy::new(0.5, Some(99));
        let b = LanePolicy::new(0.5, Some(99));
        let seq_a: Vec<Lane> = (0..64).map(|_| a.choose()).collect();
        let seq_b: Vec<Lane> = (0..64).map(|_| b.choose()).collect();
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.contains(&Lane::Deferred));
        assert!(seq_a.contains(&Lane::Immediate));
    }

    #[test]
    fn test_stop_without_start_is_safe() {
        let scheduler = WorkloadScheduler::new();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_start_without_runtime_starts_nothing() {
        let scheduler = WorkloadScheduler::new();
        let action: UpdateAction = Arc::new(|| {});
        let started = scheduler.start_channels(
            vec![ChannelSpec { kind: ChannelKind::State, hz: 10.0, action }],
            Arc::new(TokioLanes::new()),
            LanePolicy::new(0.0, Some(0)),
        );
        assert_eq!(started, 0);
        assert!(!scheduler.is_running());
    }

    fn counting(kind: ChannelKind, hz: f64, counter: &Arc<AtomicUsize>) -> ChannelSpec {
        let c = counter.clone();
        ChannelSpec {
            kind,
            hz,
            action: Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_tick_at_their_period() {
        let scheduler = WorkloadScheduler::new();
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));
        let off = Arc::new(AtomicUsize::new(0));

        let started = scheduler.start_channels(
            vec![
                counting(ChannelKind::State, 10.0, &fast),
                counting(ChannelKind::Structural, 2.0, &slow),
                counting(ChannelKind::Context, 0.0, &off),
            ],
            Arc::new(TokioLanes::new()),
            LanePolicy::new(0.0, Some(0)),
        );
        assert_eq!(started, 2);
        assert_eq!(
            scheduler.active_timers(),
            vec![ChannelKind::State, ChannelKind::Structural]
        );

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(fast.load(Ordering::SeqCst), 10);
        assert_eq!(slow.load(Ordering::SeqCst), 2);
        assert_eq!(off.load(Ordering::SeqCst), 0);

        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(fast.load(Ordering::SeqCst), 10, "no ticks after stop");
        assert!(scheduler.active_timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_leak_timers() {
        let scheduler = WorkloadScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            scheduler.start_channels(
                vec![counting(ChannelKind::State, 10.0, &count)],
                Arc::new(TokioLanes::new()),
                LanePolicy::new(0.0, Some(0)),
            );
            let second = scheduler.start_channels(
                vec![counting(ChannelKind::State, 10.0, &count)],
                Arc::new(TokioLanes::new()),
                LanePolicy::new(0.0, Some(0)),
            );
            assert_eq!(second, 0, "start while running is a no-op");
            scheduler.stop();
        }

        scheduler.start_channels(
            vec![counting(ChannelKind::State, 10.0, &count)],
            Arc::new(TokioLanes::new()),
            LanePolicy::new(0.0, Some(0)),
        );
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_ratio_routes_everything_deferred() {
        let scheduler = WorkloadScheduler::new();
        let lanes = Arc::new(TokioLanes::new());
        let count = Arc::new(AtomicUsize::new(0));

        scheduler.start_channels(
            vec![counting(ChannelKind::Context, 10.0, &count)],
            lanes.clone(),
            LanePolicy::new(1.0, Some(3)),
        );
        tokio::time::sleep(Duration::from_millis(350)).await;
        scheduler.stop();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(lanes.deferred_count(), 3);
        assert_eq!(lanes.immediate_count(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
