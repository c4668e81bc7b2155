//! Shipper configuration.

use std::time::Duration;

use logship_delivery::ChatAddress;
use serde::Deserialize;

/// Lower bound on the snapshot interval.
pub const MIN_INTERVAL_SECS: u64 = 3;

const DEFAULT_POLL_INTERVAL_MS: u64 = 400;
const DEFAULT_INTERVAL_SECS: u64 = 1800;

/// Errors from [`ShipperConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("interval must be at least {MIN_INTERVAL_SECS}s, got {0}s")]
    IntervalTooShort(u64),
}

/// Configuration for tailing and periodic shipping.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipperConfig {
    /// Tail responsiveness and existence-wait granularity.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Full-snapshot shipping cadence.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Destination chat.
    pub chat_id: i64,
    /// Optional topic within the chat.
    #[serde(default)]
    pub topic_id: Option<i64>,
    /// Per-installation identifier injected into captions.
    #[serde(default = "default_install_id")]
    pub install_id: String,
}

impl ShipperConfig {
    pub fn new(chat_id: i64) -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            chat_id,
            topic_id: None,
            install_id: default_install_id(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(ConfigError::IntervalTooShort(self.interval_secs));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn chat(&self) -> ChatAddress {
        ChatAddress::new(self.chat_id, self.topic_id)
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_install_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
