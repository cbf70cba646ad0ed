//! # Transport
//!
//! Two-state bridge between the local router and the distributed broker.
//!
//! ```text
//!                 broker I/O error
//!   ┌───────────┐ ───────────────→ ┌──────────┐
//!   │ Connected │                  │ Degraded │
//!   └───────────┘ ←─────────────── └──────────┘
//!                 handshake + drain
//! ```
//!
//! Local delivery never depends on the state: the bus routes every event
//! locally before handing it here. The transport only decides what happens
//! to the remote copy:
//!
//! - **Connected**: appended to the outbox; a single forwarder task
//!   publishes it on `<prefix>:<source>`.
//! - **Degraded**: appended to the [`ResilienceQueue`].
//! - **Local-only** (no broker configured): dropped.
//!
//! State, outbox, queue and connection live behind one mutex. Forwarding,
//! draining and reconnecting are serialized by a second, async lock, so a
//! drain never interleaves with live traffic.

use bridge_types::{EventEnvelope, SystemId, PROTOCOL_VERSION};
use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::broker::{BrokerConnection, BrokerConnector, BrokerMessage, BrokerStream};
use crate::config::BusConfig;
use crate::error::TransportError;
use crate::queue::{QueuedEntryInfo, ResilienceQueue};
use crate::router::Router;

/// How long stopped background tasks get to finish before being aborted.
const TASK_GRACE: Duration = Duration::from_millis(500);

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Connected,
    Degraded,
}

/// Message exchanged over the broker.
///
/// `origin` identifies the publishing bus instance; receivers drop their own
/// messages when the broker echoes them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub version: u16,
    pub origin: Uuid,
    pub envelope: EventEnvelope,
}

#[derive(Serialize)]
struct OutboundWire<'a> {
    version: u16,
    origin: Uuid,
    envelope: &'a EventEnvelope,
}

fn encode(origin: Uuid, envelope: &EventEnvelope) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&OutboundWire {
        version: PROTOCOL_VERSION,
        origin,
        envelope,
    })
}

struct Inner {
    state: TransportState,
    connection: Option<Arc<dyn BrokerConnection>>,
    outbox: VecDeque<Arc<EventEnvelope>>,
    queue: ResilienceQueue,
    /// Bumped on every successful connect; stale failure reports are ignored.
    generation: u64,
    closed: bool,
}

/// Broker transport with degraded-mode buffering.
pub struct Transport {
    config: BusConfig,
    connector: Option<Arc<dyn BrokerConnector>>,
    router: Arc<Router>,
    instance_id: Uuid,
    inner: Mutex<Inner>,
    forward_lock: tokio::sync::Mutex<()>,
    outbox_ready: Notify,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    received: AtomicU64,
    forwarded: AtomicU64,
    degraded_transitions: AtomicU64,
}

impl Transport {
    /// Create the transport and make the first connection attempt.
    ///
    /// A failed attempt does not block startup: the transport starts
    /// Degraded and the reconnect supervisor keeps trying. Without a
    /// connector the transport runs local-only and spawns nothing.
    pub async fn start(
        config: BusConfig,
        connector: Option<Arc<dyn BrokerConnector>>,
        router: Arc<Router>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let transport = Arc::new(Self {
            config,
            connector,
            router,
            instance_id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                state: TransportState::Degraded,
                connection: None,
                outbox: VecDeque::new(),
                queue: ResilienceQueue::new(),
                generation: 0,
                closed: false,
            }),
            forward_lock: tokio::sync::Mutex::new(()),
            outbox_ready: Notify::new(),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            received: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            degraded_transitions: AtomicU64::new(0),
        });

        let Some(connector) = transport.connector.clone() else {
            info!(instance = %transport.instance_id, "No broker configured, running local-only");
            return transport;
        };

        match transport.reconnect().await {
            Ok(_) => info!(
                broker = %connector.describe(),
                instance = %transport.instance_id,
                "Transport started connected"
            ),
            Err(err) => warn!(
                broker = %connector.describe(),
                error = %err,
                "Broker unreachable at startup, starting degraded"
            ),
        }

        let forwarder = tokio::spawn(Arc::clone(&transport).run_forwarder());
        let supervisor = tokio::spawn(Arc::clone(&transport).run_supervisor());
        transport.tasks.lock().extend([forwarder, supervisor]);
        transport
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Hand over the remote copy of a locally routed event. Never blocks.
    pub fn dispatch(&self, event: &Arc<EventEnvelope>) {
        if self.connector.is_none() {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        let state = inner.state;
        match state {
            TransportState::Connected => {
                inner.outbox.push_back(Arc::clone(event));
                drop(inner);
                self.outbox_ready.notify_one();
            }
            TransportState::Degraded => {
                let depth = inner.queue.enqueue(Arc::clone(event));
                drop(inner);
                trace!(event_id = %event.id, queued = depth, "Event queued while degraded");
                self.note_depth(depth);
            }
        }
    }

    fn note_depth(&self, depth: usize) {
        if depth > 0 && depth % self.config.queue_warn_threshold == 0 {
            warn!(
                queued = depth,
                "Resilience queue is growing, broker still unreachable"
            );
        }
    }

    async fn run_forwarder(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                () = stopped(&mut shutdown) => break,
                () = self.outbox_ready.notified() => self.pump().await,
            }
        }
        debug!("Forwarder stopped");
    }

    async fn pump(&self) {
        let _guard = self.forward_lock.lock().await;
        self.pump_locked().await;
    }

    /// Forward the outbox until it is empty or the broker fails.
    /// Caller holds `forward_lock`.
    async fn pump_locked(&self) {
        loop {
            let (event, connection, generation) = {
                let mut inner = self.inner.lock();
                if inner.state != TransportState::Connected {
                    return;
                }
                let Some(connection) = inner.connection.clone() else {
                    return;
                };
                let Some(event) = inner.outbox.pop_front() else {
                    return;
                };
                (event, connection, inner.generation)
            };

            if let Err(err) = self.forward(connection.as_ref(), &event).await {
                self.degrade(generation, Some(event), &err).await;
                return;
            }
        }
    }

    async fn forward(
        &self,
        connection: &dyn BrokerConnection,
        event: &EventEnvelope,
    ) -> Result<(), TransportError> {
        let payload = match encode(self.instance_id, event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(event_id = %event.id, error = %err, "Failed to encode event, not forwarding");
                return Ok(());
            }
        };

        connection
            .publish(&self.config.channel_for(event.source), payload)
            .await?;
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        trace!(event_id = %event.id, source = %event.source, "Event forwarded to broker");
        Ok(())
    }

    /// Connected → Degraded.
    ///
    /// The failed event and everything still in the outbox move to the
    /// queue in publish order. Reports for an older connection are ignored.
    async fn degrade(
        &self,
        generation: u64,
        failed: Option<Arc<EventEnvelope>>,
        reason: &TransportError,
    ) {
        let (connection, depth) = {
            let mut inner = self.inner.lock();
            if inner.state != TransportState::Connected || inner.generation != generation {
                if let Some(event) = failed {
                    let state = inner.state;
                    match state {
                        TransportState::Degraded => {
                            inner.queue.requeue_front(event);
                        }
                        TransportState::Connected => {
                            inner.outbox.push_front(event);
                            self.outbox_ready.notify_one();
                        }
                    }
                }
                return;
            }

            inner.state = TransportState::Degraded;
            let connection = inner.connection.take();
            let pending: Vec<_> = failed.into_iter().chain(inner.outbox.drain(..)).collect();
            for event in pending {
                let depth = inner.queue.enqueue(event);
                self.note_depth(depth);
            }
            (connection, inner.queue.len())
        };

        self.degraded_transitions.fetch_add(1, Ordering::Relaxed);
        warn!(error = %reason, queued = depth, "Broker unavailable, switching to degraded mode");

        if let Some(connection) = connection {
            connection.close().await;
        }
    }

    // =========================================================================
    // RECONNECT
    // =========================================================================

    /// Degraded → Connected.
    ///
    /// Connects, subscribes, drains the resilience queue and only then
    /// resumes live traffic. Returns the number of drained events; `Ok(0)`
    /// if already connected.
    pub async fn reconnect(self: &Arc<Self>) -> Result<usize, TransportError> {
        let _guard = self.forward_lock.lock().await;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.establish().await
    }

    /// Caller holds `forward_lock`.
    async fn establish(self: &Arc<Self>) -> Result<usize, TransportError> {
        let connector = self.connector.as_ref().ok_or(TransportError::NotConfigured)?;
        if self.is_connected() {
            return Ok(0);
        }

        let pending = PendingConnection::new(connector.connect().await?);
        let stream = match pending.connection().subscribe(&self.channels()).await {
            Ok(stream) => stream,
            Err(err) => {
                pending.close().await;
                return Err(err);
            }
        };

        let (drained, generation) = match self.drain(pending.connection()).await {
            Ok(done) => done,
            Err(err) => {
                pending.close().await;
                return Err(err);
            }
        };
        pending.installed();

        if !self.is_closed() {
            self.spawn_listener(stream, generation);
        }
        info!(broker = %connector.describe(), drained, "Broker connection established");
        Ok(drained)
    }

    /// Forward queued events, lane by lane, then flip to Connected.
    ///
    /// An entry leaves the queue only after its publish succeeded. The flip
    /// happens under the state lock once the queue is observed empty, so
    /// events published during the drain are drained too.
    async fn drain(
        &self,
        connection: &Arc<dyn BrokerConnection>,
    ) -> Result<(usize, u64), TransportError> {
        let mut lane: Option<SystemId> = None;
        let mut drained = 0;

        loop {
            let next = {
                let mut inner = self.inner.lock();
                let next = inner.queue.next_in_drain_order(lane);
                let Some(next) = next else {
                    inner.state = TransportState::Connected;
                    inner.connection = Some(Arc::clone(connection));
                    inner.generation += 1;
                    return Ok((drained, inner.generation));
                };
                next
            };
            lane = Some(next.source);

            if let Err(err) = self.forward(connection.as_ref(), &next).await {
                warn!(
                    error = %err,
                    drained,
                    remaining = self.queued_events(),
                    "Drain interrupted, keeping remaining events queued"
                );
                return Err(err);
            }
            self.inner.lock().queue.remove_front(next.source, next.id);
            drained += 1;

            if !self.config.drain_delay.is_zero() {
                sleep(self.config.drain_delay).await;
            }
        }
    }

    async fn run_supervisor(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            let wait = self.config.reconnect_interval + jitter(self.config.reconnect_interval);
            tokio::select! {
                () = stopped(&mut shutdown) => break,
                () = sleep(wait) => {}
            }
            if self.is_connected() {
                continue;
            }
            match self.reconnect().await {
                Ok(drained) => info!(drained, "Reconnected to broker"),
                Err(TransportError::Closed) => break,
                Err(err) => debug!(error = %err, "Reconnect attempt failed"),
            }
        }
        debug!("Reconnect supervisor stopped");
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    fn channels(&self) -> Vec<String> {
        SystemId::ALL
            .iter()
            .map(|system| self.config.channel_for(*system))
            .collect()
    }

    fn spawn_listener(self: &Arc<Self>, mut stream: BrokerStream, generation: u64) {
        let transport = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = stopped(&mut shutdown) => break,
                    message = stream.next() => match message {
                        Some(message) => transport.handle_inbound(message),
                        None => {
                            transport
                                .degrade(generation, None, &TransportError::ConnectionLost)
                                .await;
                            break;
                        }
                    },
                }
            }
            debug!(generation, "Broker listener stopped");
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    fn handle_inbound(&self, message: BrokerMessage) {
        let wire: WireMessage = match serde_json::from_slice(&message.payload) {
            Ok(wire) => wire,
            Err(err) => {
                warn!(channel = %message.channel, error = %err, "Dropping undecodable broker message");
                return;
            }
        };

        if wire.origin == self.instance_id {
            return;
        }
        if wire.version != PROTOCOL_VERSION {
            warn!(
                channel = %message.channel,
                version = wire.version,
                "Dropping broker message with unsupported protocol version"
            );
            return;
        }

        self.received.fetch_add(1, Ordering::Relaxed);
        let envelope = Arc::new(wire.envelope);
        debug!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            origin = %wire.origin,
            "Event received from broker"
        );
        self.router.route(&envelope);
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Stop the transport. Idempotent.
    ///
    /// Attempts one bounded final flush (reconnecting first when degraded),
    /// stops the background tasks, closes the connection and drops whatever
    /// is still queued. Returns the number of dropped events.
    pub async fn shutdown(self: &Arc<Self>) -> usize {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return 0;
            }
            inner.closed = true;
        }

        if self.connector.is_some() {
            let deadline = self.config.shutdown_deadline;
            if timeout(deadline, self.flush()).await.is_err() {
                warn!(?deadline, "Final flush did not finish before the shutdown deadline");
            }
        }

        self.shutdown_tx.send_replace(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for mut task in tasks {
            if timeout(TASK_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }

        let (connection, dropped) = {
            let mut inner = self.inner.lock();
            inner.state = TransportState::Degraded;
            let dropped = inner.queue.clear() + inner.outbox.len();
            inner.outbox.clear();
            (inner.connection.take(), dropped)
        };
        if let Some(connection) = connection {
            connection.close().await;
        }

        if dropped > 0 {
            warn!(dropped, "Dropping undelivered events on shutdown");
        }
        info!(instance = %self.instance_id, "Transport shut down");
        dropped
    }

    async fn flush(self: &Arc<Self>) {
        let _guard = self.forward_lock.lock().await;
        if !self.is_connected() {
            if let Err(err) = self.establish().await {
                warn!(error = %err, "Final reconnect attempt failed");
                return;
            }
        }
        self.pump_locked().await;
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }

    /// True when no broker is configured.
    #[must_use]
    pub fn is_local_only(&self) -> bool {
        self.connector.is_none()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Events waiting in the resilience queue.
    #[must_use]
    pub fn queued_events(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Queue contents in drain order.
    #[must_use]
    pub fn queued_snapshot(&self) -> Vec<QueuedEntryInfo> {
        self.inner.lock().queue.snapshot()
    }

    /// Events accepted for live forwarding but not yet published.
    #[must_use]
    pub fn pending_forward(&self) -> usize {
        self.inner.lock().outbox.len()
    }

    /// Inbound events from other bus instances.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events successfully published to the broker.
    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Connected → Degraded transitions so far.
    #[must_use]
    pub fn degraded_transitions(&self) -> u64 {
        self.degraded_transitions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

/// A broker connection not yet handed to the transport state.
///
/// Dropping it unresolved (`establish` cancelled, e.g. by the shutdown
/// deadline) closes the connection on a spawned task.
struct PendingConnection {
    connection: Arc<dyn BrokerConnection>,
    armed: bool,
}

impl PendingConnection {
    fn new(connection: Arc<dyn BrokerConnection>) -> Self {
        Self {
            connection,
            armed: true,
        }
    }

    fn connection(&self) -> &Arc<dyn BrokerConnection> {
        &self.connection
    }

    /// The connection now lives in the transport state.
    fn installed(mut self) {
        self.armed = false;
    }

    async fn close(mut self) {
        self.armed = false;
        self.connection.close().await;
    }
}

impl Drop for PendingConnection {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Connection attempt abandoned, closing pending broker connection");
        let connection = Arc::clone(&self.connection);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { connection.close().await });
        }
    }
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn jitter(interval: Duration) -> Duration {
    let max = u64::try_from(interval.as_millis() / 10).unwrap_or(u64::MAX).max(1);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}
