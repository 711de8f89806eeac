//! Configuration for the message tracker.
//!
//! Configuration can be loaded from a TOML file; every key is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackerConfig {
    /// Byte budget of the committed-record ledger (default: 10MB).
    #[serde(default = "default_delta_capacity_bytes")]
    pub delta_capacity_bytes: usize,
    /// Byte budget of pending checkpoint emissions (default: 10MB).
    #[serde(default = "default_latency_capacity_bytes")]
    pub latency_capacity_bytes: usize,
    /// Log every accepted message as JSON (default: false).
    #[serde(default)]
    pub log_connector_messages: bool,
}

// Default value functions
fn default_delta_capacity_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_latency_capacity_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            delta_capacity_bytes: default_delta_capacity_bytes(),
            latency_capacity_bytes: default_latency_capacity_bytes(),
            log_connector_messages: false,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
