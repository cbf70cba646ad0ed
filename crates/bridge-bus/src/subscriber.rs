//! # Event Subscriber
//!
//! Defines the receiving side of the bus: callback handlers, the worker that
//! runs them, and a pull-based stream alternative.
//!
//! Every subscription owns one FIFO channel. The router only enqueues; the
//! worker drains the channel one event at a time, so a subscriber observes
//! events in publish order and a slow or failing handler never holds up the
//! publisher or other subscribers.

use async_trait::async_trait;
use bridge_types::{EventEnvelope, EventType, SystemId};
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, warn};

/// Error type a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of handling one event.
pub type HandlerResult = Result<(), HandlerError>;

/// Which subscriber group a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Events targeted at one system (or at `both`).
    System(SystemId),
    /// Only events whose target is exactly `both`.
    Broadcast,
    /// Cross-cutting listeners of the optimization event kinds.
    Optimization,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(system) => write!(f, "{system}"),
            Self::Broadcast => f.write_str("broadcast"),
            Self::Optimization => f.write_str("optimization"),
        }
    }
}

/// Event kind filter of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventSelector {
    /// Wildcard (`*`).
    Any,
    /// A single kind.
    Only(EventType),
}

impl EventSelector {
    /// Whether the selector accepts the kind.
    #[must_use]
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            Self::Any => true,
            Self::Only(kind) => *kind == event_type,
        }
    }
}

impl From<EventType> for EventSelector {
    fn from(kind: EventType) -> Self {
        Self::Only(kind)
    }
}

/// Process-unique subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub selector: EventSelector,
    pub audience: Audience,
}

/// Callback invoked for every matching event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus and go no further.
    async fn handle(&self, event: Arc<EventEnvelope>) -> HandlerResult;

    /// Name used in logs.
    fn name(&self) -> &str {
        "handler"
    }
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<EventEnvelope>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, event: Arc<EventEnvelope>) -> HandlerResult {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Run a handler over a subscription channel until the channel closes.
///
/// Errors and panics raised by the handler are contained here.
pub(crate) fn spawn_worker(
    handle: SubscriptionHandle,
    handler: Arc<dyn EventHandler>,
    mut receiver: mpsc::UnboundedReceiver<Arc<EventEnvelope>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let outcome = AssertUnwindSafe(handler.handle(Arc::clone(&event)))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    subscription = %handle.id,
                    handler = handler.name(),
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    "Subscriber failed to handle event"
                ),
                Err(_) => error!(
                    subscription = %handle.id,
                    handler = handler.name(),
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Subscriber panicked while handling event"
                ),
            }
        }
        debug!(subscription = %handle.id, "Subscriber worker stopped");
    })
}

/// Pull-based subscription.
///
/// Implements `tokio_stream::Stream`. Dropping the stream does not remove
/// the registration; call `unsubscribe` with [`EventStream::handle`].
pub struct EventStream {
    handle: SubscriptionHandle,
    inner: UnboundedReceiverStream<Arc<EventEnvelope>>,
}

impl EventStream {
    pub(crate) fn new(
        handle: SubscriptionHandle,
        receiver: mpsc::UnboundedReceiver<Arc<EventEnvelope>>,
    ) -> Self {
        Self {
            handle,
            inner: UnboundedReceiverStream::new(receiver),
        }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the subscription was removed and every pending
    /// event has been received.
    pub async fn recv(&mut self) -> Option<Arc<EventEnvelope>> {
        self.inner.next().await
    }

    /// The subscription handle.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Stream for EventStream {
    type Item = Arc<EventEnvelope>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
