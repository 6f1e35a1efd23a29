//! Integration tests for the workload scheduler driving the synthetic workload
//!
//! Tests:
//! 1. Channel frequencies translate into commit counts
//! 2. Context channel falls back to context.update_hz
//! 3. Seeded transition ratio splits ticks across both lanes
//! 4. Deferred updates queued before unmount are dropped
//! 5. Seed recurrence of the generated tree

use std::sync::Arc;
use std::time::Duration;

use loadlab::telemetry::{ManualClock, PROFILER_ACTUAL};
use loadlab::workload::{tree, MountedWorkload, SyntheticWorkload, WorkloadScheduler};
use loadlab::{ChannelKind, LeafKind, RuntimeOptions, Scenario, Telemetry};

fn scenario(prop_hz: f64, state_hz: f64, context_hz: f64, ratio: f64) -> Scenario {
    let mut scenario = Scenario::default();
    scenario.churn.prop_hz = prop_hz;
    scenario.churn.state_hz = state_hz;
    scenario.churn.context_hz = context_hz;
    scenario.churn.transition_ratio = ratio;
    scenario.flags.strict_mode = false;
    scenario.seed = Some(11);
    scenario
}

fn telemetry() -> Telemetry {
    Telemetry::with_clock(RuntimeOptions::default(), Arc::new(ManualClock::new(0.0)))
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_channel_frequencies_drive_commits() {
    println!("[TEST] Starting channel frequency test");
    let telemetry = telemetry();
    let scenario = scenario(4.0, 10.0, 0.0, 0.0);
    let mut only_state = scenario.clone();
    only_state.context.update_hz = 0.0;

    let workload = SyntheticWorkload::mount(&only_state, telemetry.profiler_sink());
    let scheduler = WorkloadScheduler::new();
    assert_eq!(scheduler.start(&only_state, &workload), 2);
    assert_eq!(
        scheduler.active_timers(),
        vec![ChannelKind::Structural, ChannelKind::State]
    );

    tokio::time::sleep(Duration::from_millis(1010)).await;
    scheduler.stop();

    let stats = workload.stats();
    assert_eq!(stats.root_seed, 4);
    assert_eq!(stats.state_pulse, 10);
    assert_eq!(stats.context_pulse, 0);
    assert_eq!(stats.passes, 1 + 4 + 10);

    telemetry.flush();
    assert_eq!(telemetry.get_series(PROFILER_ACTUAL).len(), 15);
    println!("[TEST] ✓ 4 Hz + 10 Hz produced 14 update commits in one second");
}

#[tokio::test(start_paused = true)]
async fn test_context_channel_falls_back_to_update_hz() {
    println!("[TEST] Starting context fallback test");
    let telemetry = telemetry();
    let mut scenario = scenario(0.0, 0.0, 0.0, 0.0);
    scenario.context.update_hz = 5.0;

    let workload = SyntheticWorkload::mount(&scenario, telemetry.profiler_sink());
    let scheduler = WorkloadScheduler::new();
    assert_eq!(scheduler.start(&scenario, &workload), 1);
    assert_eq!(scheduler.active_timers(), vec![ChannelKind::Context]);

    tokio::time::sleep(Duration::from_millis(1010)).await;
    scheduler.stop();
    assert_eq!(workload.stats().context_pulse, 5);
    println!("[TEST] ✓ Context channel ran at update_hz");
}

#[tokio::test(start_paused = true)]
async fn test_transition_ratio_uses_both_lanes() {
    println!("[TEST] Starting lane split test");
    let telemetry = telemetry();
    let mut scenario = scenario(0.0, 100.0, 0.0, 0.5);
    scenario.context.update_hz = 0.0;

    let workload = SyntheticWorkload::mount(&scenario, telemetry.profiler_sink());
    let scheduler = WorkloadScheduler::new();
    scheduler.start(&scenario, &workload);

    tokio::time::sleep(Duration::from_millis(1005)).await;
    scheduler.stop();
    settle().await;

    let stats = workload.stats();
    assert_eq!(stats.immediate_submissions + stats.deferred_submissions, 100);
    assert!(stats.immediate_submissions > 20, "immediate {}", stats.immediate_submissions);
    assert!(stats.deferred_submissions > 20, "deferred {}", stats.deferred_submissions);
    assert_eq!(stats.state_pulse, 100, "deferred updates still run");
    println!(
        "[TEST] ✓ Lanes: {} immediate / {} deferred",
        stats.immediate_submissions, stats.deferred_submissions
    );
}

#[tokio::test]
async fn test_unmount_ignores_late_deferred_updates() {
    let telemetry = telemetry();
    let scenario = scenario(0.0, 10.0, 0.0, 1.0);
    let workload = SyntheticWorkload::mount(&scenario, telemetry.profiler_sink());

    let action = workload.update_action(ChannelKind::State);
    workload
        .lanes()
        .submit_deferred(Box::new(move || action()));
    // Queued but not yet run.
    workload.unmount();
    settle().await;

    let stats = workload.stats();
    assert_eq!(stats.deferred_submissions, 1);
    assert_eq!(stats.state_pulse, 0);
    assert_eq!(stats.passes, 1);
    println!("[TEST] ✓ Deferred update after unmount was ignored");
}

#[test]
fn test_tree_seed_recurrence() {
    let nodes = tree::generate(2, 2, &[LeafKind::Text, LeafKind::Layout, LeafKind::List]);
    let seeds: Vec<u64> = nodes.iter().map(|n| n.seed).collect();
    // Pre-order: root, child 0, its children, child 1, its children.
    assert_eq!(seeds, vec![0, 0, 0, 1, 1, 31, 32]);

    let leaves: Vec<Option<LeafKind>> = nodes.iter().filter(|n| n.is_leaf()).map(|n| n.variant).collect();
    assert_eq!(
        leaves,
        vec![
            Some(LeafKind::List),
            Some(LeafKind::Text),
            Some(LeafKind::Text),
            Some(LeafKind::Layout),
        ]
    );
    println!("[TEST] ✓ Seeds and leaf variants follow the recurrence");
}
