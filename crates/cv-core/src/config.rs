//! Gate configuration, read from a YAML file

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for a node's version gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Listen address of this member (`host:port`), the key of its membership row
    pub address: String,

    /// How long to wait for the replicated engine to report readiness
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// How long to wait for other members to upgrade before retrying an open
    #[serde(default = "default_peer_wait_timeout_ms")]
    pub peer_wait_timeout_ms: u64,

    /// Upper bound of the random delay before an auto-update is triggered
    #[serde(default = "default_update_jitter_max_ms")]
    pub update_jitter_max_ms: u64,

    /// Environment variable naming the auto-update executable
    #[serde(default = "default_schema_update_env")]
    pub schema_update_env: String,

    /// Busy/lock retry settings for process-lifetime transactions
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backoff settings applied when the engine reports contention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

fn default_peer_wait_timeout_ms() -> u64 {
    60_000
}

fn default_update_jitter_max_ms() -> u64 {
    30_000
}

fn default_schema_update_env() -> String {
    "SCHEMA_UPDATE".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2_000
}

impl GateConfig {
    /// Configuration with every default and the given listen address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ready_timeout_ms: default_ready_timeout_ms(),
            peer_wait_timeout_ms: default_peer_wait_timeout_ms(),
            update_jitter_max_ms: default_update_jitter_max_ms(),
            schema_update_env: default_schema_update_env(),
            retry: RetryConfig::default(),
        }
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        let config: GateConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.address.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Member address cannot be empty".to_string(),
            });
        }

        if self.ready_timeout_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "ready_timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            });
        }

        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn peer_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_wait_timeout_ms)
    }

    pub fn update_jitter_max(&self) -> Duration {
        Duration::from_millis(self.update_jitter_max_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
