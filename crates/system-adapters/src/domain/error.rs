//! # Domain Errors
//!
//! Every adapter operation fails with exactly one error type,
//! [`IntegrationError`], naming the system, the operation and the cause.
//! Raw transport errors never leave the adapter.

use bridge_bus::BusError;
use bridge_types::SystemId;
use std::time::Duration;
use thiserror::Error;

/// Why an adapter call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationCause {
    /// The call did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The remote system could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote system answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The caller supplied unusable input; nothing was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// A failed call against an external system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{system} {operation} failed: {cause}")]
pub struct IntegrationError {
    /// System the call was made against.
    pub system: SystemId,
    /// Operation name, e.g. `execute_workflow`.
    pub operation: &'static str,
    /// Underlying cause.
    #[source]
    pub cause: IntegrationCause,
}

impl IntegrationError {
    pub fn new(system: SystemId, operation: &'static str, cause: IntegrationCause) -> Self {
        Self {
            system,
            operation,
            cause,
        }
    }

    /// Shorthand for an input rejected before any I/O.
    pub fn invalid_input(
        system: SystemId,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(system, operation, IntegrationCause::InvalidInput(reason.into()))
    }

    /// Whether the call failed because its deadline elapsed.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, IntegrationCause::Timeout(_))
    }

    /// HTTP status, if the remote system answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match &self.cause {
            IntegrationCause::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while reacting to a bus event.
///
/// Logged by the reactor; never propagated to the bus.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The outbound call failed or the event payload was unusable.
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// The follow-up event could not be published.
    #[error("failed to publish follow-up event: {0}")]
    Publish(#[from] BusError),

    /// The follow-up payload could not be serialized.
    #[error("failed to encode follow-up payload: {0}")]
    Encode(#[from] serde_json::Error),
}
