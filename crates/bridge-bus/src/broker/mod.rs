//! # Broker Port
//!
//! Outbound port to the distributed pub/sub channel.
//!
//! The transport is the only caller. A connector produces connections; a
//! connection carries both the publish side and the inbound subscription.
//!
//! - [`MemoryBroker`]: in-process broker with failure injection
//! - [`RedisConnector`]: Redis pub/sub (feature `redis`)

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::TransportError;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryBroker;
#[cfg(feature = "redis")]
pub use self::redis::RedisConnector;

/// A raw message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Inbound message stream. Ends when the connection is lost.
pub type BrokerStream = BoxStream<'static, BrokerMessage>;

/// Factory for broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a connection and complete the handshake.
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, TransportError>;

    /// Human-readable endpoint, for logs.
    fn describe(&self) -> String;
}

/// An established broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Publish a payload on a channel.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribe to a set of channels.
    async fn subscribe(&self, channels: &[String]) -> Result<BrokerStream, TransportError>;

    /// Release the connection.
    async fn close(&self);
}
