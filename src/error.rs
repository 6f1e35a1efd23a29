//! Unified error type hierarchy for loadlab
//!
//! Provides structured error handling with ConfigError, SourceError and
//! ReportError. The telemetry core itself never hands these to its callers:
//! sampling source failures are logged and absorbed by the metrics engine.

use std::io;
use thiserror::Error;

/// Scenario file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in scenario: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid TOML in scenario: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Failed to encode scenario as TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Unsupported scenario format: {0}")]
    UnsupportedFormat(String),

    #[error("Scenario validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during scenario operations: {0}")]
    IoError(#[from] io::Error),
}

/// Sampling source lifecycle errors.
///
/// Returned by `SamplingSource::start` / `SamplingSource::stop` and swallowed
/// (logged) by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Sampling source '{0}' is not supported on this host")]
    Unsupported(String),

    #[error("Sampling source '{0}' requires a running tokio runtime")]
    NoRuntime(String),

    #[error("Sampling source '{id}' failed: {reason}")]
    Failed { id: String, reason: String },
}

/// Run report export errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error while writing run report: {0}")]
    IoError(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound("/tmp/scenario.json".to_string());
        assert_eq!(err.to_string(), "Scenario file not found: /tmp/scenario.json");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Failed {
            id: "memory".to_string(),
            reason: "probe unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Sampling source 'memory' failed: probe unavailable");

        let err = SourceError::NoRuntime("fps".to_string());
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[test]
    fn test_report_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: ReportError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
