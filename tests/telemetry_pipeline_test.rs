//! Integration tests for the telemetry pipeline
//!
//! Store -> notifier -> statistics, through the public `Telemetry` API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadlab::telemetry::{
    jank_counts, summarize, summarize_run, ClosedWindow, ManualClock, FPS_FRAME, PROFILER_COMMIT,
};
use loadlab::{RuntimeOptions, Telemetry};

fn manual() -> (Telemetry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0.0));
    let options = RuntimeOptions {
        series_capacity: 50,
        ..RuntimeOptions::default()
    };
    (Telemetry::with_clock(options, clock.clone()), clock)
}

#[test]
fn test_capacity_keeps_newest_points() {
    let (telemetry, _) = manual();
    for i in 0..120 {
        telemetry.store().push("cap", i as f64, i as f64);
    }
    telemetry.flush();

    let snap = telemetry.get_series("cap");
    assert_eq!(snap.len(), 50);
    assert_eq!(snap.first().map(|p| p.t), Some(70.0));
    assert_eq!(snap.last().map(|p| p.t), Some(119.0));
    assert!(snap.windows(2).all(|w| w[0].t < w[1].t));
    println!("[TEST] ✓ Eviction keeps the newest 50 points in order");
}

#[test]
fn test_snapshot_identity_signals_change() {
    let (telemetry, _) = manual();
    telemetry.store().push("a", 0.0, 1.0);
    telemetry.store().push("b", 0.0, 1.0);
    telemetry.flush();

    let a = telemetry.get_series("a");
    let b = telemetry.get_series("b");
    telemetry.store().push("a", 1.0, 2.0);
    telemetry.flush();

    assert!(!telemetry.get_series("a").ptr_eq(&a));
    assert!(telemetry.get_series("b").ptr_eq(&b));
    assert!(telemetry.get_series("unknown").is_empty());
    println!("[TEST] ✓ Only dirty series get a new snapshot");
}

#[tokio::test(start_paused = true)]
async fn test_subscription_batches_per_tick() {
    let (telemetry, _) = manual();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let c = calls.clone();
    let s = seen.clone();
    let store = telemetry.store().clone();
    let id = telemetry.subscribe(move || {
        c.fetch_add(1, Ordering::SeqCst);
        s.lock().unwrap().push(store.get_snapshot("burst").len());
    });
    assert!(telemetry.notifier().is_started());

    for i in 0..200 {
        telemetry.store().push("burst", i as f64, 1.0);
    }
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one notification for a burst");
    assert_eq!(*seen.lock().unwrap(), vec![50]);

    assert!(telemetry.unsubscribe(id));
    telemetry.store().push("burst", 201.0, 1.0);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no calls after unsubscribe");
    println!("[TEST] ✓ Batched notification and unsubscribe");
}

#[test]
fn test_rolling_stats_against_clock() {
    let (telemetry, clock) = manual();
    for i in 0..=20 {
        telemetry.store().push(FPS_FRAME, i as f64 * 50.0, if i % 2 == 0 { 16.0 } else { 18.0 });
    }
    telemetry.flush();

    clock.set(1000.0);
    let stats = telemetry.rolling_stats(FPS_FRAME, 100.0);
    assert_eq!(stats.n, 3);
    assert_eq!(stats.min, Some(16.0));
    assert_eq!(stats.max, Some(18.0));

    clock.set(5000.0);
    let stale = telemetry.rolling_stats(FPS_FRAME, 100.0);
    assert_eq!(stale.n, 0);
    assert!(stale.avg.is_none());
    println!("[TEST] ✓ Rolling stats follow the pipeline clock");
}

#[test]
fn test_closed_window_summary_and_jank() {
    let (telemetry, _) = manual();
    let frames = [(100.0, 10.0), (200.0, 20.0), (300.0, 40.0), (900.0, 99.0)];
    for (t, v) in frames {
        telemetry.store().push(FPS_FRAME, t, v);
    }
    for i in 1..=10 {
        telemetry.store().push(PROFILER_COMMIT, 100.0 + i as f64, i as f64);
    }
    telemetry.flush();

    let window = ClosedWindow { start: 100.0, end: 300.0 };
    let frames = telemetry.get_series(FPS_FRAME);
    let jank = jank_counts(&frames, &window);
    assert_eq!((jank.over_16ms, jank.over_33ms), (2, 1));

    let run = summarize_run(telemetry.store(), &window);
    assert_eq!(run.frame_ms.count, 3);
    assert_eq!(run.commit_ms.p95, Some(9.0));
    assert_eq!(run.jank, jank);
    assert_eq!(run.memory_mb.count, 0);

    let again = summarize(&telemetry.get_series(PROFILER_COMMIT), &window);
    assert_eq!(again, run.commit_ms);
    println!("[TEST] ✓ Closed-window summary and jank counts");
}
