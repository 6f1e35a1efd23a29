//! Built-in instrumented workload.
//!
//! Renders a materialized seed tree in-process. Each node render burns a
//! simulated cost proportional to its hook count, leaf payload and context
//! consumers, and every committed pass is reported to the `ProfilerSink`.

use std::hint::black_box;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::lanes::{DispatchLanes, TokioLanes};
use super::tree::{self, NodeRecord};
use super::{MountedWorkload, UpdateAction, WorkloadFactory, WorkloadStats};
use crate::models::{ChannelKind, Scenario};
use crate::telemetry::sources::{CommitObservation, CommitPhase, ProfilerSink};

/// LCG step used as per-unit simulated work.
const WORK_MULTIPLIER: u64 = 6364136223846793005;

/// Context consumers rendered under every leaf: `consumers_per_provider`
/// for each provider, with at least one provider's worth.
pub fn consumer_count(scenario: &Scenario) -> u64 {
    (scenario.context.consumers_per_provider as u64)
        .saturating_mul(scenario.context.providers.max(1) as u64)
}

/// Work units of one node render: itself, its hooks, its leaf payload and,
/// for leaves, its context consumers.
pub fn render_units(node: &NodeRecord, scenario: &Scenario) -> u64 {
    let payload = node
        .variant
        .map(|kind| tree::leaf_payload(kind, node.seed, &scenario.payload))
        .unwrap_or(0) as u64;
    let consumers = if node.is_leaf() {
        consumer_count(scenario)
    } else {
        0
    };
    1 + scenario.hooks.total() as u64 + payload + consumers
}

/// Value seen by a leaf's consumers. Consumer `i` reads provider
/// `i % providers`.
pub fn context_input(provider_values: &[u64], consumers: u64) -> u64 {
    if provider_values.is_empty() {
        return 0;
    }
    let len = provider_values.len() as u64;
    (0..consumers).fold(0u64, |acc, i| {
        acc.rotate_left(5) ^ provider_values[(i % len) as usize]
    })
}

/// Simulated work for one node render. Returns a checksum so the work can't
/// be optimized away.
pub fn render_node(
    node: &NodeRecord,
    scenario: &Scenario,
    state_value: u64,
    context_value: u64,
) -> u64 {
    let units = render_units(node, scenario);

    let mut acc = node.seed ^ state_value.rotate_left(17) ^ context_value;
    for i in 0..units {
        acc = black_box(acc.wrapping_mul(WORK_MULTIPLIER).wrapping_add(i));
    }
    acc
}

struct SyntheticState {
    scenario: Scenario,
    nodes: Vec<NodeRecord>,
    /// Per-node state slots, `state_per_node.max(1)` wide
    slots: Vec<Vec<u64>>,
    /// Provider index -> current context value
    provider_values: Vec<u64>,
    root_seed: u64,
    state_pulse: u64,
    context_pulse: u64,
    base_duration_ms: f64,
    passes: u64,
    nodes_rendered: u64,
    checksum: u64,
    unmounted: bool,
}

impl SyntheticState {
    fn new(scenario: &Scenario) -> Self {
        let nodes = tree::generate(
            scenario.tree.depth,
            scenario.tree.breadth,
            &scenario.tree.component_types,
        );
        let slot_width = scenario.hooks.state_per_node.max(1) as usize;
        SyntheticState {
            slots: vec![vec![0; slot_width]; nodes.len()],
            provider_values: (0..scenario.context.providers as u64).collect(),
            nodes,
            scenario: scenario.clone(),
            root_seed: 0,
            state_pulse: 0,
            context_pulse: 0,
            base_duration_ms: 0.0,
            passes: 0,
            nodes_rendered: 0,
            checksum: 0,
            unmounted: false,
        }
    }

    fn render_pass(&mut self, leaves_only: bool) -> u64 {
        let mut checksum = 0u64;
        let mut rendered = 0u64;
        let leaf_context = context_input(&self.provider_values, consumer_count(&self.scenario));
        for (idx, node) in self.nodes.iter().enumerate() {
            if leaves_only && !node.is_leaf() {
                continue;
            }
            let state_value = self.slots[idx].iter().fold(0u64, |a, s| a.wrapping_add(*s));
            let ctx = if node.is_leaf() { leaf_context } else { 0 };
            checksum ^= render_node(node, &self.scenario, state_value, ctx);
            rendered += 1;
        }
        self.nodes_rendered += rendered;
        checksum
    }

    /// Run one committed pass, rendering twice under strict mode.
    fn commit(&mut self, phase: CommitPhase, leaves_only: bool, sink: &ProfilerSink) {
        let start_ts = sink.now();
        let started = Instant::now();

        if self.scenario.flags.strict_mode {
            black_box(self.render_pass(leaves_only));
        }
        self.checksum = self.render_pass(leaves_only);

        let actual_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        if !leaves_only {
            self.base_duration_ms = actual_duration_ms;
        }
        self.passes += 1;

        sink.record(CommitObservation {
            phase,
            actual_duration_ms,
            base_duration_ms: self.base_duration_ms,
            start_ts,
            commit_ts: sink.now(),
        });
    }

    fn apply(&mut self, channel: ChannelKind, sink: &ProfilerSink) {
        if self.unmounted {
            return;
        }
        match channel {
            ChannelKind::Structural => {
                self.root_seed = self.root_seed.wrapping_add(1);
                self.nodes = tree::generate_from_root(
                    self.root_seed,
                    self.scenario.tree.depth,
                    self.scenario.tree.breadth,
                    &self.scenario.tree.component_types,
                );
                self.commit(CommitPhase::Update, false, sink);
            }
            ChannelKind::State => {
                self.state_pulse = self.state_pulse.wrapping_add(1);
                let pulse = self.state_pulse;
                for slots in self.slots.iter_mut() {
                    let idx = (pulse % slots.len() as u64) as usize;
                    slots[idx] = pulse;
                }
                self.commit(CommitPhase::Update, false, sink);
            }
            ChannelKind::Context => {
                self.context_pulse = self.context_pulse.wrapping_add(1);
                let pulse = self.context_pulse;
                for (i, value) in self.provider_values.iter_mut().enumerate() {
                    *value = pulse.wrapping_add(i as u64);
                }
                self.commit(CommitPhase::Update, true, sink);
            }
        }
    }
}

/// A mounted synthetic tree.
pub struct SyntheticWorkload {
    state: Arc<Mutex<SyntheticState>>,
    sink: ProfilerSink,
    lanes: Arc<TokioLanes>,
}

impl SyntheticWorkload {
    /// Materialize the tree and report the mount pass.
    pub fn mount(scenario: &Scenario, sink: ProfilerSink) -> Self {
        let mut state = SyntheticState::new(scenario);
        state.commit(CommitPhase::Mount, false, &sink);
        log::info!(
            "[WORKLOAD] Mounted {} nodes (depth {}, breadth {}) in {:.2}ms",
            state.nodes.len(),
            scenario.tree.depth,
            scenario.tree.breadth,
            state.base_duration_ms
        );
        SyntheticWorkload {
            state: Arc::new(Mutex::new(state)),
            sink,
            lanes: Arc::new(TokioLanes::new()),
        }
    }

    /// Provider values, indexed by provider.
    pub fn provider_values(&self) -> Vec<u64> {
        self.state
            .lock()
            .map(|s| s.provider_values.clone())
            .unwrap_or_default()
    }

    pub fn is_unmounted(&self) -> bool {
        self.state.lock().map(|s| s.unmounted).unwrap_or(true)
    }
}

impl MountedWorkload for SyntheticWorkload {
    fn update_action(&self, channel: ChannelKind) -> UpdateAction {
        let state = Arc::clone(&self.state);
        let sink = self.sink.clone();
        Arc::new(move || {
            let mut state = match state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.apply(channel, &sink);
        })
    }

    fn lanes(&self) -> Arc<dyn DispatchLanes> {
        self.lanes.clone()
    }

    fn stats(&self) -> WorkloadStats {
        let mut stats = match self.state.lock() {
            Ok(s) => WorkloadStats {
                nodes: s.nodes.len(),
                passes: s.passes,
                nodes_rendered: s.nodes_rendered,
                root_seed: s.root_seed,
                state_pulse: s.state_pulse,
                context_pulse: s.context_pulse,
                ..WorkloadStats::default()
            },
            Err(_) => WorkloadStats::default(),
        };
        stats.immediate_submissions = self.lanes.immediate_count();
        stats.deferred_submissions = self.lanes.deferred_count();
        stats
    }

    fn unmount(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.unmounted {
            state.unmounted = true;
            log::info!("[WORKLOAD] Unmounted after {} passes", state.passes);
        }
    }
}

/// Factory for `SyntheticWorkload`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticFactory;

impl WorkloadFactory for SyntheticFactory {
    fn mount(&self, scenario: &Scenario, sink: ProfilerSink) -> Box<dyn MountedWorkload> {
        Box::new(SyntheticWorkload::mount(scenario, sink))
    }
}
