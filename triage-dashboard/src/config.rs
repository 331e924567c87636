//! Dashboard configuration
//!
//! Resolution order: YAML file in the platform config dir, then `TRIAGE_*`
//! environment variables (after `.env` is loaded), then command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

pub const ENV_BACKEND_URL: &str = "TRIAGE_BACKEND_URL";
pub const ENV_LOG_LEVEL: &str = "TRIAGE_LOG_LEVEL";
pub const ENV_REQUEST_TIMEOUT: &str = "TRIAGE_REQUEST_TIMEOUT_SECS";
pub const ENV_STREAM_IDLE_TIMEOUT: &str = "TRIAGE_STREAM_IDLE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend_url: String,
    /// Applies to every request except the event stream
    pub request_timeout_secs: u64,
    /// Fail a run whose stream sends nothing for this long. Unset means wait forever.
    pub stream_idle_timeout_secs: Option<u64>,
    pub log_level: String,
    /// Where exports land. Unset means the current directory.
    pub export_dir: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 30,
            stream_idle_timeout_secs: None,
            log_level: "info".to_string(),
            export_dir: None,
        }
    }
}

impl DashboardConfig {
    /// File, then environment
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Override fields from `TRIAGE_*` variables. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log_level = level;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            match raw.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {}", ENV_REQUEST_TIMEOUT),
            }
        }
        if let Some(raw) = lookup(ENV_STREAM_IDLE_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.stream_idle_timeout_secs = None,
                Ok(secs) => self.stream_idle_timeout_secs = Some(secs),
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring invalid {}", ENV_STREAM_IDLE_TIMEOUT)
                }
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// `config.yaml` in the platform config dir
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "triage-dashboard", "triage-dashboard")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

/// Data dir for the TUI log file
pub fn data_dir() -> PathBuf {
    match directories::ProjectDirs::from("com", "triage-dashboard", "triage-dashboard") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from(".triage-dashboard"),
    }
}
