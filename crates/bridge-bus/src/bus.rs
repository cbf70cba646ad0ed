//! # Event Bus
//!
//! Facade tying validator, registry, router and transport together.
//!
//! `publish` validates, routes to local subscribers and hands the remote
//! copy to the transport, in that order, without awaiting any I/O. A
//! validation failure returns before anything is delivered.

use async_trait::async_trait;
use bridge_types::{EventEnvelope, PartialEvent, SystemId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::broker::BrokerConnector;
use crate::config::{BusConfig, ConfigError};
use crate::error::{BusError, TransportError};
use crate::publisher::EventPublisher;
use crate::registry::SubscriptionRegistry;
use crate::router::Router;
use crate::subscriber::{
    spawn_worker, Audience, EventHandler, EventSelector, EventStream, FnHandler, HandlerResult,
    SubscriptionHandle, SubscriptionId,
};
use crate::transport::{Transport, TransportState};
use crate::validator::EnvelopeValidator;

/// Snapshot of bus counters for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    /// Events waiting in the resilience queue.
    pub queued_events: usize,
    pub connected: bool,
    /// Events accepted by `publish`.
    pub total_published: u64,
    /// Events received from other bus instances.
    pub total_received: u64,
    /// Events published to the broker, live or drained.
    pub forwarded: u64,
    pub degraded_transitions: u64,
    pub subscriptions: usize,
    pub state: TransportState,
    pub local_only: bool,
}

/// The cross-system event bus.
pub struct EventBus {
    config: BusConfig,
    validator: EnvelopeValidator,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<Router>,
    transport: Arc<Transport>,
    published: AtomicU64,
    closed: AtomicBool,
    workers: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus backed by a broker.
    ///
    /// Never fails on an unreachable broker: the bus then starts degraded.
    pub async fn connect(
        config: BusConfig,
        connector: Arc<dyn BrokerConnector>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(connector)).await
    }

    /// Create a bus without a broker. Events are only delivered locally.
    pub async fn local(config: BusConfig) -> Result<Self, ConfigError> {
        Self::build(config, None).await
    }

    async fn build(
        config: BusConfig,
        connector: Option<Arc<dyn BrokerConnector>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let router = Arc::new(Router::new(Arc::clone(&registry)));
        let transport = Transport::start(config.clone(), connector, Arc::clone(&router)).await;

        Ok(Self {
            config,
            validator: EnvelopeValidator::new(),
            registry,
            router,
            transport,
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            workers: Mutex::new(HashMap::new()),
        })
    }

    // =========================================================================
    // PUBLISH
    // =========================================================================

    /// Validate and publish an event.
    ///
    /// Local subscribers always get the event, whatever the transport state.
    pub fn publish(&self, event: PartialEvent) -> Result<Arc<EventEnvelope>, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let envelope = match self.validator.validate(event) {
            Ok(envelope) => Arc::new(envelope),
            Err(err) => {
                debug!(error = %err, "Rejected invalid event");
                return Err(err.into());
            }
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        let delivered = self.router.route(&envelope);
        self.transport.dispatch(&envelope);

        debug!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            source = %envelope.source,
            target = %envelope.target,
            delivered,
            "Event published"
        );
        Ok(envelope)
    }

    // =========================================================================
    // SUBSCRIBE
    // =========================================================================

    /// Register a callback for `selector` events delivered to `audience`.
    pub fn subscribe<H>(
        &self,
        selector: impl Into<EventSelector>,
        audience: Audience,
        handler: H,
    ) -> Result<SubscriptionHandle, BusError>
    where
        H: EventHandler + 'static,
    {
        self.subscribe_handler(selector.into(), audience, Arc::new(handler))
    }

    /// Register a shared callback.
    pub fn subscribe_handler(
        &self,
        selector: EventSelector,
        audience: Audience,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let (handle, receiver) = self.registry.register(selector, audience);
        let worker = spawn_worker(handle, handler, receiver);
        self.workers.lock().insert(handle.id, worker);
        Ok(handle)
    }

    /// Register an async closure.
    pub fn subscribe_fn<F, Fut>(
        &self,
        name: &str,
        selector: impl Into<EventSelector>,
        audience: Audience,
        f: F,
    ) -> Result<SubscriptionHandle, BusError>
    where
        F: Fn(Arc<EventEnvelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe(selector, audience, FnHandler::new(name, f))
    }

    /// Every event targeted at `system` (including broadcasts).
    pub fn subscribe_to_system<H>(
        &self,
        system: SystemId,
        handler: H,
    ) -> Result<SubscriptionHandle, BusError>
    where
        H: EventHandler + 'static,
    {
        self.subscribe(EventSelector::Any, Audience::System(system), handler)
    }

    /// Threshold, optimization and healing-start events, whatever their target.
    pub fn subscribe_optimization_events<H>(
        &self,
        handler: H,
    ) -> Result<SubscriptionHandle, BusError>
    where
        H: EventHandler + 'static,
    {
        self.subscribe(EventSelector::Any, Audience::Optimization, handler)
    }

    /// Pull-based subscription.
    pub fn stream(
        &self,
        selector: impl Into<EventSelector>,
        audience: Audience,
    ) -> Result<EventStream, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let (handle, receiver) = self.registry.register(selector.into(), audience);
        Ok(EventStream::new(handle, receiver))
    }

    /// Remove a subscription. Events already queued for it are still handled.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        // Dropping the join handle detaches the worker; it exits once its
        // channel is drained.
        self.workers.lock().remove(&handle.id);
        self.registry.unregister(handle)
    }

    // =========================================================================
    // STATUS & LIFECYCLE
    // =========================================================================

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            queued_events: self.transport.queued_events(),
            connected: self.transport.is_connected(),
            total_published: self.published.load(Ordering::Relaxed),
            total_received: self.transport.received(),
            forwarded: self.transport.forwarded(),
            degraded_transitions: self.transport.degraded_transitions(),
            subscriptions: self.registry.len(),
            state: self.transport.state(),
            local_only: self.transport.is_local_only(),
        }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Try to reconnect now instead of waiting for the supervisor.
    pub async fn reconnect(&self) -> Result<usize, TransportError> {
        self.transport.reconnect().await
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut the bus down. Idempotent.
    ///
    /// Stops accepting publishes, lets the transport make its final flush,
    /// then removes every subscription and waits (up to the shutdown
    /// deadline) for subscriber workers to finish what they already hold.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Event bus already shut down");
            return;
        }
        info!("Shutting down event bus");

        let dropped = self.transport.shutdown().await;
        let removed = self.registry.clear();

        let deadline = Instant::now() + self.config.shutdown_deadline;
        let workers: Vec<_> = self.workers.lock().drain().map(|(_, w)| w).collect();
        let mut aborted = 0;
        for mut worker in workers {
            if timeout_at(deadline, &mut worker).await.is_err() {
                worker.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            warn!(aborted, "Subscriber workers did not finish before the deadline");
        }

        info!(
            dropped,
            subscriptions = removed,
            published = self.published.load(Ordering::Relaxed),
            "Event bus shut down"
        );
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: PartialEvent) -> Result<Arc<EventEnvelope>, BusError> {
        EventBus::publish(self, event)
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
