//! Scenario file loader and serialization.

use crate::error::ConfigError;
use crate::models::Scenario;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk scenario encodings, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Json,
    Toml,
}

impl ScenarioFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ScenarioFormat::Json),
            Some("toml") => Ok(ScenarioFormat::Toml),
            Some(other) => Err(ConfigError::UnsupportedFormat(format!(
                "Scenario file must be .json or .toml, got .{}",
                other
            ))),
            None => Err(ConfigError::UnsupportedFormat(
                "Scenario file must have a .json or .toml extension".to_string(),
            )),
        }
    }
}

/// Validate scenario path (non-empty, UTF-8, supported extension).
pub fn validate_scenario_path(path: &Path) -> Result<ScenarioFormat, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Scenario path cannot be empty".to_string(),
        ));
    }

    if path.to_str().is_none() {
        return Err(ConfigError::ValidationFailed(
            "Scenario path contains invalid characters".to_string(),
        ));
    }

    ScenarioFormat::from_path(path)
}

/// Parse scenario text in the given format.
pub fn parse_scenario(content: &str, format: ScenarioFormat) -> Result<Scenario, ConfigError> {
    let scenario = match format {
        ScenarioFormat::Json => serde_json::from_str(content)?,
        ScenarioFormat::Toml => toml::from_str(content)?,
    };
    Ok(scenario)
}

/// Load scenario from a `.json` or `.toml` file.
pub fn load_scenario_from_file(path: &Path) -> Result<Scenario, ConfigError> {
    let format = validate_scenario_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let scenario = parse_scenario(&content, format)?;
    log::debug!("[CONFIG] Loaded scenario from {}", path.display());
    Ok(scenario)
}

/// Save scenario, encoding chosen by extension.
pub fn save_scenario_to_file(scenario: &Scenario, path: &Path) -> Result<(), ConfigError> {
    let format = validate_scenario_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = match format {
        ScenarioFormat::Json => serde_json::to_string_pretty(scenario)?,
        ScenarioFormat::Toml => toml::to_string_pretty(scenario)?,
    };

    fs::write(path, content)?;
    Ok(())
}

/// List scenario files (non-recursive) in a directory, sorted.
pub fn list_scenario_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::FileNotFound(format!(
            "Scenario directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && ScenarioFormat::from_path(&path).is_ok() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
