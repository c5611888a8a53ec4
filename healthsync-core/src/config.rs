//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/healthsync/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/healthsync/` (~/.config/healthsync/)
//! - Data: `$XDG_DATA_HOME/healthsync/` (~/.local/share/healthsync/)
//! - State/Logs: `$XDG_STATE_HOME/healthsync/` (~/.local/state/healthsync/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Remote sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Artifact store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Pipeline behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote sink configuration
///
/// The sink is a oneM2M server; every chunk becomes a content instance under
/// `<server_url>/Mobius/<user_id>/health/<category>`.
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// Base URL of the sink (scheme, host and port)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// User identifier the data is filed under
    pub user_id: Option<String>,

    /// Originator credential sent as `X-M2M-Origin`
    #[serde(default = "default_origin")]
    pub origin: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            user_id: None,
            origin: default_origin(),
            timeout_secs: default_sink_timeout(),
        }
    }
}

impl SinkConfig {
    /// Check if the sink is configured well enough to upload
    pub fn is_ready(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.user_id.as_deref() {
            None => {
                return Err(Error::Config("sink.user_id is required".to_string()));
            }
            Some(id) if id.trim().is_empty() => {
                return Err(Error::Config("sink.user_id must not be empty".to_string()));
            }
            Some(_) => {}
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "sink.server_url must be an http(s) URL, got {:?}",
                self.server_url
            )));
        }
        if self.origin.is_empty() {
            return Err(Error::Config("sink.origin must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "sink.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_server_url() -> String {
    "http://114.71.220.59:7579".to_string()
}

fn default_origin() -> String {
    "SIWLTfduOpL".to_string()
}

fn default_sink_timeout() -> u64 {
    30
}

/// Artifact store configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Override for the data root (defaults to the XDG data dir)
    pub data_root: Option<PathBuf>,
}

impl StoreConfig {
    /// Data root the artifact folder lives under
    pub fn data_root(&self) -> PathBuf {
        self.data_root.clone().unwrap_or_else(Config::data_dir)
    }
}

/// Pipeline behavior
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Seconds to wait for a data source query before recording a failure
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_secs == 0 {
            return Err(Error::Config(
                "pipeline.query_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn default_query_timeout() -> u64 {
    15
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/healthsync/config.toml` (~/.config/healthsync/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("healthsync").join("config.toml")
    }

    /// Returns the data directory path (default data root for artifacts)
    ///
    /// `$XDG_DATA_HOME/healthsync/` (~/.local/share/healthsync/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("healthsync")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/healthsync/` (~/.local/state/healthsync/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("healthsync")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/healthsync/healthsync.log` (~/.local/state/healthsync/healthsync.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("healthsync.log")
    }
}
