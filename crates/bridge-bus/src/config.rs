//! Bus configuration with validation.

use std::time::Duration;

/// Default broker channel prefix.
pub const DEFAULT_CHANNEL_PREFIX: &str = "bridge";

/// Tuning knobs of the bus and its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Channels are named `<prefix>:<source>`.
    pub channel_prefix: String,
    /// Pause between events while draining the resilience queue.
    pub drain_delay: Duration,
    /// Retry period of the reconnect supervisor while degraded.
    pub reconnect_interval: Duration,
    /// Upper bound for the final flush on shutdown.
    pub shutdown_deadline: Duration,
    /// A warning is logged each time the queue depth reaches a multiple of
    /// this value.
    pub queue_warn_threshold: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            drain_delay: Duration::from_millis(10),
            reconnect_interval: Duration::from_secs(5),
            shutdown_deadline: Duration::from_secs(5),
            queue_warn_threshold: 1000,
        }
    }
}

impl BusConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidChannelPrefix(
                "channel prefix cannot be empty".into(),
            ));
        }
        if self.channel_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidChannelPrefix(format!(
                "channel prefix cannot contain whitespace: {:?}",
                self.channel_prefix
            )));
        }
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "reconnect_interval cannot be 0".into(),
            ));
        }
        if self.shutdown_deadline.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "shutdown_deadline cannot be 0".into(),
            ));
        }
        if self.queue_warn_threshold == 0 {
            return Err(ConfigError::InvalidLimit(
                "queue_warn_threshold cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Broker channel carrying events owned by `source`.
    #[must_use]
    pub fn channel_for(&self, source: bridge_types::SystemId) -> String {
        format!("{}:{}", self.channel_prefix, source)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid channel prefix: {0}")]
    InvalidChannelPrefix(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}
