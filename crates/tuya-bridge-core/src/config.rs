//! Configuration defaults and environment overrides.
//!
//! Constants live here so the storage and device crates do not each define
//! their own copy of store paths, default ranges and queue sizes.

use serde::{Deserialize, Serialize};

/// Default values.
pub mod defaults {
    /// Lower bound assumed for a numeric vendor range with no stored metadata.
    pub const RANGE_MIN: f64 = 1.0;
    /// Upper bound assumed for a numeric vendor range with no stored metadata.
    pub const RANGE_MAX: f64 = 100.0;
    /// Step assumed for a numeric vendor range with no stored metadata.
    pub const RANGE_STEP: f64 = 1.0;

    /// Storage backend used when none is configured.
    pub const STORAGE_BACKEND: &str = "redb";
    /// Database file for the redb backend.
    pub const STORE_PATH: &str = "./data/tuya_bridge.redb";

    /// Fallback tracing directive when `RUST_LOG` is unset.
    pub const LOG_DIRECTIVE: &str = "tuya_bridge=info";

    /// Per-device event queue depth.
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Environment variable names.
pub mod env_vars {
    use super::defaults;

    pub const STORAGE_BACKEND: &str = "TUYA_BRIDGE_STORAGE";
    pub const STORE_PATH: &str = "TUYA_BRIDGE_STORE_PATH";
    pub const LOG: &str = "TUYA_BRIDGE_LOG";
    pub const LOG_FORMAT: &str = "TUYA_BRIDGE_LOG_FORMAT";
    pub const EVENT_CHANNEL_CAPACITY: &str = "TUYA_BRIDGE_EVENT_CAPACITY";

    /// Storage backend from the environment, or the default.
    pub fn storage_backend() -> String {
        std::env::var(STORAGE_BACKEND).unwrap_or_else(|_| defaults::STORAGE_BACKEND.to_string())
    }

    /// Store path from the environment, or the default.
    pub fn store_path() -> String {
        std::env::var(STORE_PATH).unwrap_or_else(|_| defaults::STORE_PATH.to_string())
    }

    /// Log directive from the environment, or the default.
    pub fn log_directive() -> String {
        std::env::var(LOG).unwrap_or_else(|_| defaults::LOG_DIRECTIVE.to_string())
    }

    /// Event queue capacity from the environment, or the default.
    pub fn event_channel_capacity() -> usize {
        std::env::var(EVENT_CHANNEL_CAPACITY)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults::EVENT_CHANNEL_CAPACITY)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(crate::Error::Config(format!("Unknown log format: {}", other))),
        }
    }
}

/// Bridge-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Tracing filter directive
    #[serde(default = "default_log_directive")]
    pub log_directive: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Storage backend type ("redb" or "memory")
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,
    /// Backend-specific configuration passed to the backend factory
    #[serde(default = "default_storage_config")]
    pub storage_config: serde_json::Value,
    /// Per-device event queue depth
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_log_directive() -> String {
    defaults::LOG_DIRECTIVE.to_string()
}

fn default_storage_backend() -> String {
    defaults::STORAGE_BACKEND.to_string()
}

fn default_storage_config() -> serde_json::Value {
    serde_json::json!({ "path": defaults::STORE_PATH })
}

fn default_event_channel_capacity() -> usize {
    defaults::EVENT_CHANNEL_CAPACITY
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_directive: default_log_directive(),
            log_format: LogFormat::default(),
            storage_backend: default_storage_backend(),
            storage_config: default_storage_config(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl BridgeConfig {
    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let log_format = std::env::var(env_vars::LOG_FORMAT)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            log_directive: env_vars::log_directive(),
            log_format,
            storage_backend: env_vars::storage_backend(),
            storage_config: serde_json::json!({ "path": env_vars::store_path() }),
            event_channel_capacity: env_vars::event_channel_capacity(),
        }
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| crate::Error::Config(format!("Invalid bridge config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::Config(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.storage_backend.trim().is_empty() {
            return Err(crate::Error::Config("storage_backend is empty".to_string()));
        }
        Ok(())
    }
}
