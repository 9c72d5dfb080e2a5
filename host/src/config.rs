//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: refresh period shared by every polled resource.
//!     - ApiConfig: where the inspection API lives and its endpoint paths.
//!     - MockConfig: in-memory data instead of (or behind) the API.
//!     - ServerConfig: where the JSON view-state is served.
//!     - LoggingConfig: log level and per-reading logging.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::poller::PollConfig;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub mocks: MockConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// fetch once at startup instead of waiting a full interval
    #[serde(default = "default_true")]
    pub immediate: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub latest: String,
    /// second-to-last reading, fetched once at startup
    pub previous: String,
    pub image: String,
    pub history: String,
    pub advisory: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MockConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    /// serve mock data when the API call fails
    pub fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms(), immediate: true }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.16.205.27:5000".to_string(),
            timeout_ms: default_timeout_ms(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            latest: "/api/sensores/ultimo".to_string(),
            previous: "/api/sensores/penultimo".to_string(),
            image: "/api/inspeccion/imagen".to_string(),
            history: "/api/sensores".to_string(),
            advisory: "/api/inspeccion/advertencia".to_string(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { enabled: true, delay_ms: 500, fallback: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: true }
    }
}

/// Where `load_or_default` got its configuration from.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { rejected: Vec<(PathBuf, ConfigError)> },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
            ConfigSource::Defaults { rejected } => {
                for (path, e) in rejected {
                    tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                }
                tracing::warn!("[CONFIG] No usable config file found - using defaults");
            }
        }
    }
}

impl PollingConfig {
    /// Schedule for one named resource.
    pub fn for_resource(&self, resource_id: &str) -> PollConfig {
        PollConfig {
            interval_ms: self.interval_ms,
            resource_id: resource_id.to_string(),
            immediate: self.immediate,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "api.base_url must not be empty".to_string(),
            });
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                message: format!("api.base_url must be an http(s) url, got '{}'", self.base_url),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "api.timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|e| ConfigError::Invalid {
            message: format!("server.bind '{}': {}", self.bind, e),
        })
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback.
    ///
    /// Runs before logging is up, so what happened is returned rather than
    /// logged; call `ConfigSource::log` once the subscriber is installed.
    pub fn load_or_default() -> (Self, ConfigSource) {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        let mut rejected = Vec::new();
        for path in paths {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return (config, ConfigSource::File(path)),
                    Err(e) => rejected.push((path, e)),
                }
            }
        }

        (Self::default(), ConfigSource::Defaults { rejected })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.for_resource("config").validate()?;
        if !self.mocks.enabled {
            self.api.validate()?;
        }
        self.server.addr()?;
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        let source = match (self.mocks.enabled, self.mocks.fallback) {
            (true, _) => "mock".to_string(),
            (false, true) => format!("{} (mock fallback)", self.api.base_url),
            (false, false) => self.api.base_url.clone(),
        };
        tracing::info!(
            interval_ms = self.polling.interval_ms,
            immediate = self.polling.immediate,
            source = %source,
            bind = %self.server.bind,
            level = %self.logging.level,
            "[CONFIG] host configuration"
        );
    }
}
