//! Stream configuration.
//!
//! Resolution order, lowest to highest priority:
//! 1. Built-in defaults
//! 2. JSON settings file (when a path is given)
//! 3. Environment variables (`TYPEDSTREAM_*`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};

/// Environment variable overriding [`StreamConfig::max_line_bytes`].
pub const ENV_MAX_LINE_BYTES: &str = "TYPEDSTREAM_MAX_LINE_BYTES";
/// Environment variable overriding [`StreamConfig::channel_capacity`].
pub const ENV_CHANNEL_CAPACITY: &str = "TYPEDSTREAM_CHANNEL_CAPACITY";

/// Tunables shared by producers and consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Longest accepted line on the consuming side. `None` means unbounded.
    pub max_line_bytes: Option<usize>,
    /// Records buffered between a producer task and the response body.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: None,
            channel_capacity: 16,
        }
    }
}

impl StreamConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".into()));
        }
        if self.max_line_bytes == Some(0) {
            return Err(Error::Config("max_line_bytes must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => StreamConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<StreamConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut StreamConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup(ENV_MAX_LINE_BYTES) {
        match val.parse() {
            Ok(n) => config.max_line_bytes = Some(n),
            Err(_) => warn!(var = ENV_MAX_LINE_BYTES, value = %val, "Ignoring unparsable override"),
        }
    }
    if let Some(val) = lookup(ENV_CHANNEL_CAPACITY) {
        match val.parse() {
            Ok(n) => config.channel_capacity = n,
            Err(_) => warn!(var = ENV_CHANNEL_CAPACITY, value = %val, "Ignoring unparsable override"),
        }
    }
}
