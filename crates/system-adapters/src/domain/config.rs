//! Adapter configuration with validation.

use std::fmt;
use std::time::Duration;

/// Default base URL of the workflow system.
pub const DEFAULT_WORKFLOW_URL: &str = "http://localhost:5678";
/// Default base URL of the evolution system.
pub const DEFAULT_EVOLUTION_URL: &str = "http://localhost:8000";
/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default TCP connect deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings of one external system.
#[derive(Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Base URL, e.g. `http://localhost:5678`.
    pub base_url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    /// Deadline of a whole call.
    pub timeout: Duration,
    /// Deadline of the TCP connect.
    pub connect_timeout: Duration,
}

impl AdapterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Workflow system at its default address.
    #[must_use]
    pub fn workflow_default() -> Self {
        Self::new(DEFAULT_WORKFLOW_URL)
    }

    /// Evolution system at its default address.
    #[must_use]
    pub fn evolution_default() -> Self {
        Self::new(DEFAULT_EVOLUTION_URL)
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|key: &String| !key.is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        let Some(rest) = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
        else {
            return Err(ConfigError::InvalidUrl(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        };
        if rest.trim_end_matches('/').is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "base_url has no host: {:?}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("timeout cannot be 0".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }
}

// The API key is a credential and stays out of logs.
impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Base URL is not an http(s) URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// The HTTP client could not be built
    #[error("http client: {0}")]
    Client(String),
}
