//! loadlab: synthetic workload generator with a real-time telemetry pipeline.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Scenario description and shared enums
//! - **config**: Scenario loading, validation and runtime tuning
//! - **telemetry**: Series store, batched notifier, statistics, sampling sources
//! - **workload**: Seeded tree generation, update scheduler, synthetic workload
//! - **orchestrator**: Run lifecycle (`RunController`)
//! - **report**: End-of-run report export
//! - **log_collector**: Decoupled, non-blocking logging pipeline

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;
pub mod telemetry;
pub mod workload;

pub mod orchestrator;
pub mod report;

// Robust, decoupled logging system
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine, LogSettings};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{ConfigError, ReportError, SourceError};

pub use models::{
    ChannelKind, ChurnConfig, ContextConfig, HooksConfig, LeafKind, PayloadConfig, Scenario,
    TreeConfig, WorkloadFlags,
};

pub use config::RuntimeOptions;

pub use telemetry::{
    ChangeNotifier, ClosedWindow, JankCounts, MetricsEngine, Point, RollingStats, RunSummary,
    RunWindow, SeriesStore, Snapshot, Summary, Telemetry, Value,
};

pub use workload::{MountedWorkload, SyntheticFactory, WorkloadFactory, WorkloadScheduler};

pub use orchestrator::{RunController, RunState, StopReason};

pub use report::RunReport;
