//! Simulation tuning loaded from JSON, with environment override

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "PI_COLONY_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Output buffer of an extractor head, in m3
    pub extractor_buffer_m3: f64,
    /// Output buffer of a factory, in m3
    pub factory_buffer_m3: f64,
    /// Maximum number of distinct timestamps processed in one run
    pub max_steps: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            extractor_buffer_m3: 10_000.0,
            factory_buffer_m3: 10_000.0,
            max_steps: 1_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SimConfig::from_json_str(&contents)?)
    }

    /// Explicit path wins, then `PI_COLONY_CONFIG`, then defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return SimConfig::from_file(path);
        }
        match env::var_os(CONFIG_ENV_VAR) {
            Some(value) if !value.is_empty() => {
                tracing::info!(path = ?value, "loading simulation config from environment");
                SimConfig::from_file(Path::new(&value))
            }
            _ => Ok(SimConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimConfig::from_json_str(r#"{ "factory_buffer_m3": 250.5 }"#).unwrap();
        assert_eq!(config.factory_buffer_m3, 250.5);
        assert_eq!(config.extractor_buffer_m3, 10_000.0);
        assert_eq!(config.max_steps, 1_000_000);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SimConfig::from_file(Path::new("/nonexistent/pi.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pi.json"));
    }
}
