//! Configuration loading and management.

use crate::model::PipeHandle;
use crate::registry::DEFAULT_CAPACITY;
use log::LevelFilter;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid log level '{0}'")]
    LogLevel(String),
    #[error("Invalid pipe handle label key '{0}'")]
    PipeKey(String),
}

/// Application configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// Pipe labels by pipe handle (hex string, e.g. "0xffff8a0c1234").
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Global settings.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level: "off", "error", "warn", "info", "debug" or "trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Endpoints preallocated per root hub registry. A root hub that
    /// configures more pipes than this makes its table reallocate under the
    /// registry lock.
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,

    /// Bytes of each transfer buffer kept with a record.
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,

    /// Dump setup packets and transfer buffers at trace level.
    #[serde(default)]
    pub dump_buffers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            registry_capacity: default_registry_capacity(),
            max_capture_bytes: default_max_capture_bytes(),
            dump_buffers: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_registry_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_max_capture_bytes() -> usize {
    4096
}

impl Settings {
    /// Parsed `log_level`.
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .trim()
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}

impl Config {
    /// Load configuration from default locations.
    /// Search order:
    /// 1. ./urbtap.toml
    /// 2. ~/.config/urbtap/config.toml
    /// 3. /etc/urbtap.toml
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::config_paths().into_iter().flatten() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // No config file found - use defaults
        Ok(Config::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.settings.level_filter()?;
        for key in config.labels.keys() {
            parse_pipe_key(key)?;
        }
        Ok(config)
    }

    /// Get list of possible config paths.
    fn config_paths() -> Vec<Option<PathBuf>> {
        vec![
            std::env::current_dir().ok().map(|p| p.join("urbtap.toml")),
            dirs::config_dir().map(|p| p.join("urbtap").join("config.toml")),
            Some(PathBuf::from("/etc/urbtap.toml")),
        ]
    }

    /// Get label for a pipe.
    pub fn pipe_label(&self, pipe: PipeHandle) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| parse_pipe_key(key).ok() == Some(pipe))
            .map(|(_, label)| label.as_str())
    }
}

/// Pipe handle from a label key: hex with or without `0x`.
fn parse_pipe_key(key: &str) -> Result<PipeHandle, ConfigError> {
    let digits = key
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map(PipeHandle)
        .map_err(|_| ConfigError::PipeKey(key.to_string()))
}

/// Generate example configuration content.
pub fn example_config() -> &'static str {
    r#"# urbtap configuration file
# Place in ./urbtap.toml, ~/.config/urbtap/config.toml, or /etc/urbtap.toml

[settings]
# Log level: off, error, warn, info, debug, trace
log_level = "warn"
# Endpoints preallocated per root hub; going past it reallocates under the
# registry lock and logs a warning
registry_capacity = 64
# Bytes of each transfer buffer kept for display
max_capture_bytes = 4096
# Hex dump setup packets and buffers (needs log_level = "trace")
dump_buffers = false

# Pipe labels (by pipe handle, hex)
[labels]
# "0xffffa00000001000" = "Keyboard interrupt IN"
"#
}
