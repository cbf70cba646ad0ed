//! # Runtime Configuration
//!
//! Everything the bridge needs, read from `BRIDGE_*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BRIDGE_BROKER_URL` | unset (local-only mode) |
//! | `BRIDGE_CHANNEL_PREFIX` | `bridge` |
//! | `BRIDGE_DRAIN_DELAY_MS` | `10` |
//! | `BRIDGE_RECONNECT_INTERVAL_SECS` | `5` |
//! | `BRIDGE_SHUTDOWN_DEADLINE_SECS` | `5` |
//! | `BRIDGE_QUEUE_WARN_THRESHOLD` | `1000` |
//! | `BRIDGE_WORKFLOW_URL` | `http://localhost:5678` |
//! | `BRIDGE_WORKFLOW_API_KEY` | unset |
//! | `BRIDGE_EVOLUTION_URL` | `http://localhost:8000` |
//! | `BRIDGE_EVOLUTION_API_KEY` | unset |
//! | `BRIDGE_ADAPTER_TIMEOUT_SECS` | `30` |
//! | `BRIDGE_HEALING_WORKFLOW_ID` | unset |
//! | `BRIDGE_HEALTH_INTERVAL_SECS` | `30` |
//! | `BRIDGE_REACTORS` | `workflow,evolution` |
//! | `BRIDGE_ADMIN_ADDR` | unset (no admin endpoint) |
//!
//! `BRIDGE_REACTORS` names the systems this instance calls in reaction to
//! events (`none` for a pure relay). Instances sharing a broker all see
//! every event, so each reactor should run on exactly one of them.
//!
//! Credentials are opaque strings and never logged.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use bridge_bus::BusConfig;
use bridge_telemetry::TelemetryConfig;
use bridge_types::SystemId;
use system_adapters::AdapterConfig;
use thiserror::Error;

/// Default period of the health reporter.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bus and transport tuning.
    pub bus: BusConfig,
    /// Broker URL; `None` runs the bus without a broker.
    pub broker_url: Option<String>,
    pub workflow: AdapterConfig,
    pub evolution: AdapterConfig,
    /// Workflow started when healing begins.
    pub healing_workflow_id: Option<String>,
    /// Period of the health reporter.
    pub health_interval: Duration,
    /// Systems whose reactor runs on this instance.
    pub reactors: Vec<SystemId>,
    /// Address of the `/health` and `/metrics` listener.
    pub admin_addr: Option<SocketAddr>,
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            broker_url: None,
            workflow: AdapterConfig::workflow_default(),
            evolution: AdapterConfig::evolution_default(),
            healing_workflow_id: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            reactors: SystemId::ALL.to_vec(),
            admin_addr: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    ///
    /// Empty values count as unset. Unparseable numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.broker_url = get("BRIDGE_BROKER_URL");
        if let Some(prefix) = get("BRIDGE_CHANNEL_PREFIX") {
            config.bus.channel_prefix = prefix;
        }
        if let Some(ms) = parse::<u64>(&get, "BRIDGE_DRAIN_DELAY_MS")? {
            config.bus.drain_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(&get, "BRIDGE_RECONNECT_INTERVAL_SECS")? {
            config.bus.reconnect_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&get, "BRIDGE_SHUTDOWN_DEADLINE_SECS")? {
            config.bus.shutdown_deadline = Duration::from_secs(secs);
        }
        if let Some(limit) = parse::<usize>(&get, "BRIDGE_QUEUE_WARN_THRESHOLD")? {
            config.bus.queue_warn_threshold = limit;
        }

        if let Some(url) = get("BRIDGE_WORKFLOW_URL") {
            config.workflow.base_url = url;
        }
        if let Some(key) = get("BRIDGE_WORKFLOW_API_KEY") {
            config.workflow = config.workflow.with_api_key(key);
        }
        if let Some(url) = get("BRIDGE_EVOLUTION_URL") {
            config.evolution.base_url = url;
        }
        if let Some(key) = get("BRIDGE_EVOLUTION_API_KEY") {
            config.evolution = config.evolution.with_api_key(key);
        }
        if let Some(secs) = parse::<u64>(&get, "BRIDGE_ADAPTER_TIMEOUT_SECS")? {
            let timeout = Duration::from_secs(secs);
            config.workflow.timeout = timeout;
            config.evolution.timeout = timeout;
        }

        config.healing_workflow_id = get("BRIDGE_HEALING_WORKFLOW_ID");
        if let Some(secs) = parse::<u64>(&get, "BRIDGE_HEALTH_INTERVAL_SECS")? {
            config.health_interval = Duration::from_secs(secs);
        }
        if let Some(list) = get("BRIDGE_REACTORS") {
            config.reactors = parse_reactors(&list)?;
        }
        config.admin_addr = parse::<SocketAddr>(&get, "BRIDGE_ADMIN_ADDR")?;

        config.telemetry = TelemetryConfig::from_lookup(&lookup);
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bus.validate()?;
        self.workflow
            .validate()
            .map_err(|source| ConfigError::Adapter {
                system: SystemId::Workflow,
                source,
            })?;
        self.evolution
            .validate()
            .map_err(|source| ConfigError::Adapter {
                system: SystemId::Evolution,
                source,
            })?;
        if let Some(url) = &self.broker_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::InvalidBrokerUrl(url.clone()));
            }
        }
        if self.health_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: "BRIDGE_HEALTH_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "health interval cannot be 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue {
                    var,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

/// Comma-separated system names, or `none`. Duplicates collapse.
fn parse_reactors(list: &str) -> Result<Vec<SystemId>, ConfigError> {
    if list.trim().eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    let mut reactors = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let system = name
            .to_ascii_lowercase()
            .parse::<SystemId>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "BRIDGE_REACTORS",
                value: list.to_string(),
                reason: e.to_string(),
            })?;
        if !reactors.contains(&system) {
            reactors.push(system);
        }
    }
    Ok(reactors)
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("{var}={value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("broker url must use redis:// or rediss://, got {0:?}")]
    InvalidBrokerUrl(String),

    #[error("bus configuration: {0}")]
    Bus(#[from] bridge_bus::ConfigError),

    #[error("{system} adapter configuration: {source}")]
    Adapter {
        system: SystemId,
        #[source]
        source: system_adapters::ConfigError,
    },
}
