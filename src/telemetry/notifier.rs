//! Batched change notification.
//!
//! Pushes only mark series dirty. Once per refresh tick the notifier commits
//! the dirty snapshots and calls every subscriber exactly once, in
//! registration order. Ticks with nothing dirty do nothing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::store::SeriesStore;

/// Handle returned by `subscribe`, used to unsubscribe.
pub type SubscriberId = u64;

type Callback = Arc<dyn Fn() + Send + Sync>;

pub struct ChangeNotifier {
    store: Arc<SeriesStore>,
    subscribers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_id: AtomicU64,
    flushing: AtomicBool,
    started: AtomicBool,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeNotifier {
    pub fn new(store: Arc<SeriesStore>) -> Self {
        ChangeNotifier {
            store,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            flushing: AtomicBool::new(false),
            started: AtomicBool::new(false),
            tick_task: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push((id, Arc::new(callback)));
        log::debug!("[NOTIFIER] Subscriber {} registered ({} total)", id, subs.len());
        id
    }

    /// Remove a subscriber. Returns false when the handle is unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// One flush cycle. Returns true when subscribers were notified.
    ///
    /// A tick issued while a flush is in progress (for example from inside a
    /// subscriber) returns false immediately.
    pub fn tick(&self) -> bool {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return false;
        }

        let committed = self.store.commit_dirty();
        if committed > 0 {
            // Callbacks run without the registry lock held so they may
            // subscribe or unsubscribe.
            let subs: Vec<(SubscriberId, Callback)> = match self.subscribers.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };

            for (id, callback) in subs {
                if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                    log::warn!("[NOTIFIER] Subscriber {} panicked during flush", id);
                }
            }
        }

        self.flushing.store(false, Ordering::SeqCst);
        committed > 0
    }

    /// Spawn the periodic tick loop on the current tokio runtime.
    ///
    /// Only the first successful call starts a loop; later calls return false.
    /// The loop holds a weak reference and exits once the notifier is dropped.
    pub fn ensure_started(self: &Arc<Self>, period: Duration) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::error!("[NOTIFIER] No tokio runtime available; tick loop not started");
                self.started.store(false, Ordering::SeqCst);
                return false;
            }
        };

        let weak: Weak<ChangeNotifier> = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(1));
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(notifier) => {
                        notifier.tick();
                    }
                    None => break,
                }
            }
        });

        if let Ok(mut slot) = self.tick_task.lock() {
            *slot = Some(task);
        }
        log::debug!("[NOTIFIER] Tick loop started ({:?} period)", period);
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.tick_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}
