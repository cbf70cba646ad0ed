//! # Bus Errors
//!
//! `BusError` is what a publisher can see. `TransportError` never reaches a
//! publisher: it is absorbed into degraded-mode bookkeeping and only
//! surfaces from explicit transport calls such as `reconnect()`.

use bridge_types::ValidationError;
use thiserror::Error;

/// Errors returned by the publish API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The event was malformed and delivered to nobody.
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// The bus has been shut down and no longer accepts events.
    #[error("event bus is shut down")]
    Closed,
}

/// Broker I/O failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection handshake failed.
    #[error("broker connect failed: {0}")]
    Connect(String),

    /// Forwarding an event failed.
    #[error("broker publish failed: {0}")]
    Publish(String),

    /// Subscribing to inbound channels failed.
    #[error("broker subscribe failed: {0}")]
    Subscribe(String),

    /// The inbound stream ended unexpectedly.
    #[error("broker connection lost")]
    ConnectionLost,

    /// No broker is configured; the bus runs local-only.
    #[error("no broker configured")]
    NotConfigured,

    /// The transport has been shut down.
    #[error("transport is shut down")]
    Closed,
}
