//! loadlab headless runner.
//!
//! Loads (or defaults) a scenario, runs it under the telemetry pipeline with
//! live rolling stats, and prints the end-of-run summary.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadlab::config::loader::load_scenario_from_file;
use loadlab::config::validator::validate_scenario;
use loadlab::telemetry::{
    rolling_stats, FPS_FRAME, FPS_VALUE, MEMORY_RSS_MB, PROFILER_COMMIT,
};
use loadlab::{
    LogCollector, LogSettings, RunController, RunReport, RuntimeOptions, Scenario,
    SyntheticFactory, Telemetry,
};

/// Live stats are printed at most this often.
const LIVE_INTERVAL_MS: f64 = 1000.0;

#[derive(Parser, Debug)]
#[command(name = "loadlab", version, about = "Synthetic workload generator with live telemetry")]
struct Cli {
    /// Scenario file (.json or .toml); built-in defaults when omitted
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Run duration in seconds (overrides the scenario)
    #[arg(long)]
    duration: Option<u64>,

    /// Seed for deferred-lane selection
    #[arg(long)]
    seed: Option<u64>,

    /// Refresh rate of the notifier and frame source
    #[arg(long, default_value_t = loadlab::config::DEFAULT_REFRESH_HZ)]
    refresh_hz: f64,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory for the session log file
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Label recorded in the report
    #[arg(long)]
    label: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_scenario(cli: &Cli) -> Result<Scenario> {
    let mut scenario = match cli.scenario.as_deref() {
        Some(path) => load_scenario_from_file(path)
            .with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => Scenario::default(),
    };
    if let Some(duration) = cli.duration {
        scenario.duration_sec = duration;
    }
    if cli.seed.is_some() {
        scenario.seed = cli.seed;
    }
    validate_scenario(&scenario).context("Invalid scenario")?;
    Ok(scenario)
}

/// Subscriber printing one line of rolling stats per interval.
fn live_stats_printer(telemetry: &Telemetry) -> impl Fn() + Send + Sync + 'static {
    let store = telemetry.store().clone();
    let clock = telemetry.clock().clone();
    let last_print = Mutex::new(f64::NEG_INFINITY);

    move || {
        let now = clock.now_ms();
        {
            let mut last = match last_print.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if now - *last < LIVE_INTERVAL_MS {
                return;
            }
            *last = now;
        }

        let fps = rolling_stats(&store.get_snapshot(FPS_VALUE), now, LIVE_INTERVAL_MS);
        let frame = rolling_stats(&store.get_snapshot(FPS_FRAME), now, LIVE_INTERVAL_MS);
        let commit = rolling_stats(&store.get_snapshot(PROFILER_COMMIT), now, LIVE_INTERVAL_MS);
        let rss = store
            .latest(MEMORY_RSS_MB)
            .and_then(|p| p.v.as_number())
            .unwrap_or(0.0);

        log::info!(
            "[LIVE] fps {:.1} | frame max {:.1}ms | commits {} avg {:.2}ms | rss {:.1}MB",
            fps.avg.unwrap_or(0.0),
            frame.max.unwrap_or(0.0),
            commit.n,
            commit.avg.unwrap_or(0.0),
            rss
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let collector = LogCollector::new(LogSettings {
        log_dir: cli.log_dir.clone(),
        echo: true,
        level: if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    })
    .map_err(anyhow::Error::msg)?;
    if let Err(e) = collector.install() {
        eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
    }
    if let Some(path) = collector.session_log_path() {
        log::info!("[Main] Session log: {}", path.display());
    }

    let scenario = build_scenario(&cli)?;

    let options = RuntimeOptions {
        refresh_hz: cli.refresh_hz,
        ..RuntimeOptions::default()
    };
    let telemetry = Telemetry::new(options);
    telemetry.register_default_sources();
    let live = telemetry.subscribe(live_stats_printer(&telemetry));

    let controller = RunController::new(telemetry.clone(), Arc::new(SyntheticFactory));
    let started_at = Local::now();
    controller.start(&scenario);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;
    loop {
        tokio::select! {
            res = &mut ctrl_c, if ctrl_c_armed => {
                if let Err(e) = res {
                    log::warn!("[Main] Ctrl-C handler unavailable: {}", e);
                    ctrl_c_armed = false;
                    continue;
                }
                log::info!("[Main] Interrupted, stopping run");
                controller.stop();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if !controller.is_running() {
                    break;
                }
            }
        }
    }

    telemetry.unsubscribe(live);

    let report = RunReport::from_controller(&controller, cli.label.clone(), started_at)
        .context("Run finished without a closed window")?;
    println!("{}", report.render_table());

    if let Some(path) = cli.report.as_deref() {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if let Err(e) = collector.flush_sync() {
        eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
    }
    Ok(())
}
