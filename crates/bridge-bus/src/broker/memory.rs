//! In-process broker.
//!
//! Behaves like a pub/sub server shared by every connection made from the
//! same [`MemoryBroker`] value (clones share state). Availability can be
//! toggled to simulate outages: while unavailable, connects, publishes and
//! subscribes fail and every open subscription stream ends.

use async_trait::async_trait;
use bridge_types::EventEnvelope;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{BrokerConnection, BrokerConnector, BrokerMessage, BrokerStream};
use crate::error::TransportError;
use crate::transport::WireMessage;

#[derive(Default)]
struct Shared {
    published: Vec<BrokerMessage>,
    subscribers: Vec<(Vec<String>, mpsc::UnboundedSender<BrokerMessage>)>,
}

struct BrokerState {
    available: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    publish_delay: Mutex<Duration>,
    shared: Mutex<Shared>,
}

/// In-memory broker. Starts available.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                available: AtomicBool::new(true),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                publish_delay: Mutex::new(Duration::ZERO),
                shared: Mutex::new(Shared::default()),
            }),
        }
    }

    /// Create a broker that refuses connections until made available.
    #[must_use]
    pub fn unavailable() -> Self {
        let broker = Self::new();
        broker.set_available(false);
        broker
    }

    /// Toggle availability. Going down ends every open subscription.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
        if !available {
            self.state.shared.lock().subscribers.clear();
            debug!("Memory broker went down");
        }
    }

    /// Hold every subsequent publish for `delay` before it lands.
    pub fn set_publish_delay(&self, delay: Duration) {
        *self.state.publish_delay.lock() = delay;
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    /// Every message published through a connection, in order.
    #[must_use]
    pub fn published(&self) -> Vec<BrokerMessage> {
        self.state.shared.lock().published.clone()
    }

    /// Envelopes carried by the published messages, in order.
    #[must_use]
    pub fn published_envelopes(&self) -> Vec<EventEnvelope> {
        self.published()
            .iter()
            .filter_map(|message| serde_json::from_slice::<WireMessage>(&message.payload).ok())
            .map(|wire| wire.envelope)
            .collect()
    }

    /// Deliver a message to subscribers as if another node published it.
    pub fn inject(&self, channel: &str, payload: Vec<u8>) -> usize {
        self.fan_out(&BrokerMessage {
            channel: channel.to_string(),
            payload,
        })
    }

    /// Number of successful connects.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of `close` calls on connections of this broker.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    fn fan_out(&self, message: &BrokerMessage) -> usize {
        let mut shared = self.state.shared.lock();
        shared.subscribers.retain(|(_, sender)| !sender.is_closed());
        shared
            .subscribers
            .iter()
            .filter(|(channels, _)| channels.iter().any(|c| *c == message.channel))
            .filter(|(_, sender)| sender.send(message.clone()).is_ok())
            .count()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, TransportError> {
        if !self.is_available() {
            return Err(TransportError::Connect("memory broker unavailable".into()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            broker: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

struct MemoryConnection {
    broker: MemoryBroker,
    closed: AtomicBool,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let delay = *self.broker.state.publish_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.closed.load(Ordering::SeqCst) || !self.broker.is_available() {
            return Err(TransportError::Publish("memory broker unavailable".into()));
        }
        let message = BrokerMessage {
            channel: channel.to_string(),
            payload,
        };
        self.broker.state.shared.lock().published.push(message.clone());
        self.broker.fan_out(&message);
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<BrokerStream, TransportError> {
        if self.closed.load(Ordering::SeqCst) || !self.broker.is_available() {
            return Err(TransportError::Subscribe("memory broker unavailable".into()));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        self.broker
            .state
            .shared
            .lock()
            .subscribers
            .push((channels.to_vec(), sender));
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.broker.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
