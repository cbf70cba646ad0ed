//! Redis pub/sub broker.
//!
//! Publishing goes through one multiplexed connection; every `subscribe`
//! opens a dedicated pub/sub connection whose message stream ends when the
//! server goes away.

use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use super::{BrokerConnection, BrokerConnector, BrokerMessage, BrokerStream};
use crate::error::TransportError;

/// Connector for a Redis server, e.g. `redis://127.0.0.1:6379`.
pub struct RedisConnector {
    client: Client,
    url: String,
}

impl RedisConnector {
    /// Parse the URL. No connection is made until [`BrokerConnector::connect`].
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let client = Client::open(url).map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, TransportError> {
        let mut publisher = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let pong: String = ::redis::cmd("PING")
            .query_async(&mut publisher)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(url = %self.url, reply = %pong, "Redis handshake complete");

        Ok(Arc::new(RedisConnection {
            client: self.client.clone(),
            publisher,
        }))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

struct RedisConnection {
    client: Client,
    publisher: ::redis::aio::MultiplexedConnection,
}

#[async_trait]
impl BrokerConnection for RedisConnection {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut connection = self.publisher.clone();
        connection
            .publish::<_, _, i64>(channel, payload)
            .await
            .map(|_receivers| ())
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn subscribe(&self, channels: &[String]) -> Result<BrokerStream, TransportError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        for channel in channels {
            pubsub
                .subscribe(channel)
                .await
                .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        }

        Ok(pubsub
            .into_on_message()
            .map(|msg| BrokerMessage {
                channel: msg.get_channel_name().to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            })
            .boxed())
    }

    async fn close(&self) {
        // The multiplexed connection is released with the last clone.
        debug!("Redis connection closed");
    }
}
