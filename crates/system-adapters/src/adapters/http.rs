//! # Shared JSON/HTTP client
//!
//! One [`SystemHttpClient`] per external system. It owns the reqwest client,
//! the bearer credential and the call accounting, and it is the only place
//! where reqwest errors are turned into [`IntegrationError`]s.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_types::SystemId;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time;
use tracing::{debug, warn};

use crate::domain::{
    AdapterConfig, CallStats, ConfigError, ConnectionStatus, IntegrationCause, IntegrationError,
};

/// Error bodies are cut to this many characters.
const MAX_ERROR_BODY: usize = 512;

/// Operation name used for connectivity probes.
pub(crate) const PROBE_OPERATION: &str = "test_connection";

pub(crate) struct SystemHttpClient {
    system: SystemId,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    stats: Arc<CallStats>,
}

impl SystemHttpClient {
    pub(crate) fn new(system: SystemId, config: &AdapterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            system,
            client,
            base_url: config.normalized_base_url(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            stats: Arc::new(CallStats::new()),
        })
    }

    pub(crate) fn system(&self) -> SystemId {
        self.system
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn stats(&self) -> Arc<CallStats> {
        Arc::clone(&self.stats)
    }

    /// `GET` and decode the JSON response.
    pub(crate) async fn get<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<R, IntegrationError> {
        self.call(operation, Method::GET, path, None::<&()>).await
    }

    /// Send `body` as JSON and decode the JSON response.
    pub(crate) async fn send_json<B, R>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, IntegrationError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call(operation, method, path, Some(body)).await
    }

    /// Probe `path`. Any 2xx answer counts as connected; a `version` field
    /// is read from a JSON body when there is one. Probes are not counted
    /// in [`CallStats`].
    pub(crate) async fn probe(&self, path: &str) -> ConnectionStatus {
        let started = Instant::now();
        let result = self
            .fetch(PROBE_OPERATION, Method::GET, path, None::<&()>)
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(bytes) => {
                let version = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .and_then(|body| body.get("version").and_then(Value::as_str).map(str::to_owned));
                ConnectionStatus {
                    system: self.system,
                    connected: true,
                    latency_ms,
                    version,
                    error: None,
                }
            }
            Err(e) => {
                debug!(system = %self.system, error = %e, "connectivity probe failed");
                ConnectionStatus {
                    system: self.system,
                    connected: false,
                    latency_ms,
                    version: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn call<B, R>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, IntegrationError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let call = self.stats.begin();
        let result = self
            .fetch(operation, method, path, body)
            .await
            .and_then(|bytes| self.decode(operation, &bytes));

        match &result {
            Ok(_) => call.succeed(),
            Err(e) => {
                warn!(
                    system = %self.system,
                    operation,
                    error = %e,
                    "adapter call failed"
                );
                call.fail(e.is_timeout());
            }
        }
        result
    }

    /// Send the request under the call deadline and return the body of a
    /// 2xx response.
    async fn fetch<B>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>, IntegrationError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(system = %self.system, operation, %method, %url, "adapter call");

        let mut request = self.client.request(method, &url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await.map_err(|e| self.classify(operation, e))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.classify(operation, e))?;

            if !status.is_success() {
                let body: String = String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(MAX_ERROR_BODY)
                    .collect();
                return Err(self.error(
                    operation,
                    IntegrationCause::Status {
                        status: status.as_u16(),
                        body,
                    },
                ));
            }
            Ok(bytes.to_vec())
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(self.error(operation, IntegrationCause::Timeout(self.timeout))),
        }
    }

    /// An empty body decodes as JSON `null`.
    fn decode<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        bytes: &[u8],
    ) -> Result<R, IntegrationError> {
        let decoded = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(bytes)
        };
        decoded.map_err(|e| self.error(operation, IntegrationCause::Decode(e.to_string())))
    }

    fn classify(&self, operation: &'static str, err: reqwest::Error) -> IntegrationError {
        let cause = if err.is_timeout() {
            IntegrationCause::Timeout(self.timeout)
        } else if err.is_connect() {
            IntegrationCause::Connection(format!("cannot connect to {}: {err}", self.base_url))
        } else if err.is_decode() {
            IntegrationCause::Decode(err.to_string())
        } else {
            IntegrationCause::Request(err.to_string())
        };
        self.error(operation, cause)
    }

    fn error(&self, operation: &'static str, cause: IntegrationCause) -> IntegrationError {
        IntegrationError::new(self.system, operation, cause)
    }
}

/// Check that `id` can be used as a single URL path segment.
pub(crate) fn path_segment<'a>(
    system: SystemId,
    operation: &'static str,
    what: &str,
    id: &'a str,
) -> Result<&'a str, IntegrationError> {
    if id.is_empty() {
        return Err(IntegrationError::invalid_input(
            system,
            operation,
            format!("{what} cannot be empty"),
        ));
    }
    if id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
    {
        return Err(IntegrationError::invalid_input(
            system,
            operation,
            format!("{what} {id:?} is not a valid path segment"),
        ));
    }
    Ok(id)
}
