//! # Reactive Halves
//!
//! Bus handlers that turn events from one system into calls against the
//! other. Each reactor listens on its own system's audience, ignores events
//! its own system produced, and publishes a follow-up event after a
//! successful call.
//!
//! Reactors are best-effort: a failed call or a malformed payload is logged
//! and dropped. Nothing is raised back into the bus.

mod evolution;
mod workflow;

pub use evolution::EvolutionReactor;
pub use workflow::WorkflowReactor;

use std::sync::Arc;

use bridge_bus::{
    Audience, BusError, EventBus, EventHandler, EventPublisher, EventSelector, SubscriptionHandle,
};
use bridge_types::{EventEnvelope, EventType, PartialEvent, SystemId, Target};

use crate::domain::{EventBody, ReactorError};

/// Subscribe `handler` to everything on `system`'s audience.
///
/// One subscription means one worker, so events of different kinds on the
/// same chain reach the reactor in publish order. Reactors filter by kind
/// themselves.
pub(crate) fn register_on(
    bus: &EventBus,
    system: SystemId,
    handler: Arc<dyn EventHandler>,
) -> Result<SubscriptionHandle, BusError> {
    bus.subscribe_handler(EventSelector::Any, Audience::System(system), handler)
}

/// Publish `body` as a follow-up of `cause`, keeping its correlation chain.
pub(crate) async fn publish_follow_up<B: EventBody>(
    publisher: &dyn EventPublisher,
    cause: &EventEnvelope,
    event_type: EventType,
    source: SystemId,
    target: impl Into<Target>,
    body: &B,
) -> Result<Arc<EventEnvelope>, ReactorError> {
    let event = PartialEvent::new(event_type, source, target, body.to_payload()?)
        .with_correlation_id(cause.chain_id());
    Ok(publisher.publish(event).await?)
}
