//! Synthetic workload generation.
//!
//! # Module Structure
//!
//! - `tree`: deterministic seeded tree materialization and payload sizing
//! - `lanes`: immediate / deferred dispatch lanes
//! - `scheduler`: periodic update channels with probabilistic lane choice
//! - `synthetic`: the built-in instrumented workload
//!
//! A workload is mounted from a `Scenario` through a `WorkloadFactory`, then
//! driven by the scheduler through the per-channel update actions it exposes.

pub mod lanes;
pub mod scheduler;
pub mod synthetic;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{ChannelKind, Scenario};
use crate::telemetry::sources::ProfilerSink;

pub use lanes::{DispatchLanes, TokioLanes};
pub use scheduler::{period_for, ChannelSpec, Lane, LanePolicy, WorkloadScheduler};
pub use synthetic::{SyntheticFactory, SyntheticWorkload};
pub use tree::{generate, generate_from_root, NodeRecord};

/// One-shot unit of work handed to a lane.
pub type Update = Box<dyn FnOnce() + Send + 'static>;

/// Repeatable update action for one channel.
pub type UpdateAction = Arc<dyn Fn() + Send + Sync + 'static>;

/// Counters exposed by a mounted workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkloadStats {
    pub nodes: usize,
    pub passes: u64,
    pub nodes_rendered: u64,
    pub root_seed: u64,
    pub state_pulse: u64,
    pub context_pulse: u64,
    pub immediate_submissions: u64,
    pub deferred_submissions: u64,
}

/// A live workload instance.
pub trait MountedWorkload: Send + Sync {
    /// Action the scheduler invokes for every tick of `channel`.
    fn update_action(&self, channel: ChannelKind) -> UpdateAction;

    fn lanes(&self) -> Arc<dyn DispatchLanes>;

    fn stats(&self) -> WorkloadStats;

    /// Release the instance. Later updates are ignored.
    fn unmount(&self);
}

/// Creates workload instances for a scenario.
pub trait WorkloadFactory: Send + Sync {
    fn mount(&self, scenario: &Scenario, sink: ProfilerSink) -> Box<dyn MountedWorkload>;
}
