//! End-of-run report: a printable table plus an optional JSON export.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::ReportError;
use crate::models::Scenario;
use crate::orchestrator::{RunController, StopReason};
use crate::telemetry::{ClosedWindow, RunSummary, Summary};
use crate::workload::WorkloadStats;

/// Serializable record of one finished run. Export only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RunReport {
    pub label: Option<String>,
    pub started_at: DateTime<Local>,
    pub scenario: Scenario,
    pub window: ClosedWindow,
    pub duration_ms: f64,
    pub stop_reason: Option<StopReason>,
    pub summary: RunSummary,
    pub workload: Option<WorkloadStats>,
}

impl RunReport {
    /// Build from a controller whose last run is closed. `None` while the
    /// run is still open or before any run.
    pub fn from_controller(
        controller: &RunController,
        label: Option<String>,
        started_at: DateTime<Local>,
    ) -> Option<Self> {
        let window = controller.last_window()?;
        let summary = controller.summary()?;
        Some(RunReport {
            label,
            started_at,
            scenario: controller.scenario().unwrap_or_default(),
            window,
            duration_ms: window.duration_ms(),
            stop_reason: controller.stop_reason(),
            summary,
            workload: controller.workload_stats(),
        })
    }

    /// Human-readable summary table.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let title = self.label.as_deref().unwrap_or("loadlab run");
        let _ = writeln!(out, "=== {} ===", title);
        let _ = writeln!(
            out,
            "started {}  duration {:.1}s  stop: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.duration_ms / 1000.0,
            self.stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        let _ = writeln!(
            out,
            "{:<16} {:>7} {:>10} {:>10} {:>10} {:>10}",
            "series", "count", "avg", "p95", "min", "max"
        );
        let rows: [(&str, &Summary); 5] = [
            ("frame (ms)", &self.summary.frame_ms),
            ("fps", &self.summary.fps),
            ("commit (ms)", &self.summary.commit_ms),
            ("actual (ms)", &self.summary.actual_ms),
            ("memory (MB)", &self.summary.memory_mb),
        ];
        for (name, s) in rows {
            let _ = writeln!(
                out,
                "{:<16} {:>7} {:>10} {:>10} {:>10} {:>10}",
                name,
                s.count,
                fmt_stat(s.avg),
                fmt_stat(s.p95),
                fmt_stat(s.min),
                fmt_stat(s.max)
            );
        }
        let _ = writeln!(
            out,
            "jank: {} frame(s) > 16.7ms, {} frame(s) > 33ms",
            self.summary.jank.over_16ms, self.summary.jank.over_33ms
        );
        if let Some(w) = &self.workload {
            let _ = writeln!(
                out,
                "workload: {} nodes, {} passes, {} node renders, lanes {} immediate / {} deferred",
                w.nodes, w.passes, w.nodes_rendered, w.immediate_submissions, w.deferred_submissions
            );
        }
        out
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON export, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        log::info!("[REPORT] Run report written to {}", path.display());
        Ok(())
    }
}

fn fmt_stat(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}
