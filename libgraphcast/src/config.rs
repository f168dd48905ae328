//! Configuration management for Graphcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::types::Platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub instagram: Option<PlatformConfig>,
    #[serde(default)]
    pub threads: Option<PlatformConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Per-platform account settings and profile overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub account_id: Option<String>,
    pub token_file: Option<String>,
    pub base_url: Option<String>,
    pub max_images: Option<usize>,
    pub caption_limit: Option<usize>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            account_id: None,
            token_file: None,
            base_url: None,
            max_images: None,
            caption_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_api_base_delay")]
    pub api_base_delay_secs: u64,
    #[serde(default = "default_transport_base_delay")]
    pub transport_base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            api_base_delay_secs: default_api_base_delay(),
            transport_base_delay_secs: default_transport_base_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
        }
    }
}

/// Per-call timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_create_timeout")]
    pub create_secs: u64,
    #[serde(default = "default_publish_timeout")]
    pub publish_secs: u64,
    #[serde(default = "default_status_timeout")]
    pub status_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create_secs: default_create_timeout(),
            publish_secs: default_publish_timeout(),
            status_secs: default_status_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn publish(&self) -> Duration {
        Duration::from_secs(self.publish_secs)
    }

    pub fn status(&self) -> Duration {
        Duration::from_secs(self.status_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_api_base_delay() -> u64 {
    30
}

fn default_transport_base_delay() -> u64 {
    15
}

fn default_poll_interval() -> u64 {
    30
}

fn default_poll_timeout() -> u64 {
    300
}

fn default_create_timeout() -> u64 {
    60
}

fn default_publish_timeout() -> u64 {
    120
}

fn default_status_timeout() -> u64 {
    15
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file is not an error: credentials can come from the
    /// environment alone.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Section for `platform`, if present
    pub fn platform(&self, platform: Platform) -> Option<&PlatformConfig> {
        match platform {
            Platform::Instagram => self.instagram.as_ref(),
            Platform::Threads => self.threads.as_ref(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GRAPHCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("graphcast").join("config.toml"))
}
