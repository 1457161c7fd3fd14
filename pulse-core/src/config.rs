//! Configuration management.
//!
//! Resolution order for the configuration file:
//! 1. `PULSE_CONFIG` environment variable
//! 2. `<config dir>/pulse/config.json` (e.g., `~/.config/pulse/config.json`)
//!
//! A missing file yields the defaults.

use crate::coalescer::DEFAULT_INTERVAL;
use crate::error::{PulseError, Result};
use crate::transport::{BackoffPolicy, SessionOptions, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::types::{Channel, ChannelKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default telemetry endpoint of a local console backend.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/api/v1/ws/metrics";

/// Persistent configuration for PULSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub endpoint: String,
    pub coalesce_interval_ms: u64,
    pub backoff: BackoffConfig,
    /// Seconds without a frame before the connection is declared dead (0 disables)
    pub idle_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub capacity: CapacityConfig,
    pub log_level: String,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            coalesce_interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            backoff: BackoffConfig::default(),
            idle_timeout_secs: 45,
            connect_timeout_secs: 10,
            capacity: CapacityConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            jitter: true,
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            max_delay: Duration::from_millis(config.max_ms),
            jitter: config.jitter,
        }
    }
}

/// Per-channel buffer capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Points kept per metric channel
    pub metric: usize,
    /// Lines kept for the log channel
    pub log: usize,
    /// Events kept for the alert channel
    pub alert: usize,
    /// Any other channel
    pub default: usize,
    /// Exact channel name overrides (e.g., `"metric:cpu": 1000`)
    pub overrides: BTreeMap<String, usize>,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self { metric: 500, log: 5000, alert: 1000, default: 1000, overrides: BTreeMap::new() }
    }
}

impl CapacityConfig {
    /// Capacity to use for `channel`.
    pub fn for_channel(&self, channel: &Channel) -> usize {
        if let Some(capacity) = self.overrides.get(channel.as_str()) {
            return *capacity;
        }
        match channel.kind() {
            ChannelKind::Metric(_) => self.metric,
            ChannelKind::Log => self.log,
            ChannelKind::Alert => self.alert,
            ChannelKind::Other => self.default,
        }
    }

    fn validate(&self) -> Result<()> {
        let named = [
            ("metric", self.metric),
            ("log", self.log),
            ("alert", self.alert),
            ("default", self.default),
        ];
        let overrides = self.overrides.iter().map(|(name, capacity)| (name.as_str(), *capacity));
        match named.into_iter().chain(overrides).find(|(_, capacity)| *capacity == 0) {
            Some((channel, _)) => Err(PulseError::InvalidCapacity { channel: channel.to_string() }),
            None => Ok(()),
        }
    }
}

impl PulseConfig {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PULSE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulse")
            .join("config.json")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::IoError { path: path.to_path_buf(), source: e })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| PulseError::InvalidConfig {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PulseError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| PulseError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)
            .map_err(|e| PulseError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.coalesce_interval_ms == 0 {
            return Err(PulseError::InvalidConfig {
                reason: "coalesce_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.backoff.base_ms == 0 || self.backoff.max_ms < self.backoff.base_ms {
            return Err(PulseError::InvalidConfig {
                reason: format!(
                    "backoff requires 0 < base_ms <= max_ms (got base_ms={}, max_ms={})",
                    self.backoff.base_ms, self.backoff.max_ms
                ),
            });
        }
        self.capacity.validate()
    }

    pub fn coalesce_interval(&self) -> Duration {
        Duration::from_millis(self.coalesce_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Transport session options derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            backoff: BackoffPolicy::from(&self.backoff),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}
