//! Decoupled logging pipeline.
//!
//! # Architecture
//!
//! ```text
//! log::info!() / log::warn!() ...
//!     |
//! [LogCollector] (log::Log, non-blocking)
//!     | (crossbeam unbounded channel)
//!     v
//! [writer thread] (plain OS thread, independent of the tokio runtime)
//!     |            |
//!   stderr     <log_dir>/loadlab_<YYYYmmdd_HHMMSS>.log
//! ```
//!
//! Callers never block on I/O: lines are queued and the writer thread
//! timestamps and persists them. `flush` sends a marker down the same channel
//! and waits until the writer has handled everything queued before it.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long `flush` waits for the writer thread.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker with channel sender to signal completion
    Flush(crossbeam_channel::Sender<()>),
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub level: log::Level,
    /// Wall-clock time of creation, `%H:%M:%S%.3f`
    pub timestamp: String,
}

impl LogLine {
    pub fn new(level: log::Level, message: String) -> Self {
        LogLine {
            message,
            level,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    fn render(&self) -> String {
        format!("[{}] [{}] {}\n", self.timestamp, self.level, self.message)
    }
}

/// Session log file name for the current wall-clock time.
pub fn session_log_name() -> String {
    format!("loadlab_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Builder-style settings for `LogCollector::new`.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Directory for the session file; `None` disables file output
    pub log_dir: Option<PathBuf>,
    /// Mirror lines to stderr
    pub echo: bool,
    pub level: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            log_dir: None,
            echo: true,
            level: LevelFilter::Info,
        }
    }
}

/// Global logger feeding the writer thread.
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    level: LevelFilter,
    session_path: Option<PathBuf>,
}

impl LogCollector {
    /// Create the collector and spawn its writer thread.
    pub fn new(settings: LogSettings) -> Result<Self, String> {
        let session_path = match settings.log_dir.as_deref() {
            Some(dir) => Some(open_session_path(dir)?),
            None => None,
        };

        let mut file = match session_path.as_ref() {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open session log {}: {}", path.display(), e))?,
            ),
            None => None,
        };

        let (tx, rx) = unbounded::<LogMessage>();
        let echo = settings.echo;

        std::thread::Builder::new()
            .name("loadlab-log".to_string())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    match msg {
                        LogMessage::Line(line) => write_line(&line, echo, file.as_mut()),
                        LogMessage::Flush(done) => {
                            if let Some(f) = file.as_mut() {
                                let _ = f.flush();
                            }
                            let _ = std::io::stderr().flush();
                            let _ = done.send(());
                        }
                    }
                }
            })
            .map_err(|e| format!("Failed to spawn log writer thread: {}", e))?;

        Ok(LogCollector {
            tx,
            level: settings.level,
            session_path,
        })
    }

    /// Install as the `log` crate's global logger.
    pub fn install(&self) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(self.level);
        Ok(())
    }

    pub fn session_log_path(&self) -> Option<&Path> {
        self.session_path.as_deref()
    }

    /// Queue a line (never blocks).
    pub fn log_line(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Wait until every line queued before this call has been written.
    pub fn flush_sync(&self) -> Result<(), String> {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        self.tx
            .send(LogMessage::Flush(done_tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        done_rx
            .recv_timeout(FLUSH_TIMEOUT)
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

/// Implementation of the `log` crate's Log trait
impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.log_line(LogLine::new(record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {
        if let Err(e) = self.flush_sync() {
            eprintln!("[Log] {}", e);
        }
    }
}

fn write_line(line: &LogLine, echo: bool, file: Option<&mut File>) {
    let rendered = line.render();
    if echo {
        let _ = std::io::stderr().write_all(rendered.as_bytes());
    }
    if let Some(f) = file {
        let _ = f.write_all(rendered.as_bytes());
    }
}

fn open_session_path(dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create log directory {}: {}", dir.display(), e))?;
    Ok(dir.join(session_log_name()))
}
