//! # Router
//!
//! Computes the delivery set of an envelope from its target and fans it out
//! through the registry.
//!
//! ```text
//! target = workflow   ──→ System(workflow)
//! target = evolution  ──→ System(evolution)
//! target = both       ──→ System(workflow) + System(evolution) + Broadcast
//! optimization kinds  ──→ + Optimization (whatever the target)
//! ```

use bridge_types::{EventEnvelope, SystemId, Target};
use std::sync::Arc;
use tracing::trace;

use crate::registry::SubscriptionRegistry;
use crate::subscriber::Audience;

/// Fan-out of validated envelopes to local subscribers.
pub struct Router {
    registry: Arc<SubscriptionRegistry>,
}

impl Router {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Audiences an envelope is delivered to.
    #[must_use]
    pub fn audiences(event: &EventEnvelope) -> Vec<Audience> {
        let mut audiences = match event.target {
            Target::System(system) => vec![Audience::System(system)],
            Target::Both => SystemId::ALL
                .iter()
                .map(|system| Audience::System(*system))
                .chain(std::iter::once(Audience::Broadcast))
                .collect(),
        };
        if event.event_type.is_optimization_relevant() {
            audiences.push(Audience::Optimization);
        }
        audiences
    }

    /// Enqueue the envelope for every matching subscription.
    ///
    /// Never waits on a handler. Returns the number of subscriptions reached.
    pub fn route(&self, event: &Arc<EventEnvelope>) -> usize {
        let delivered = Self::audiences(event)
            .into_iter()
            .map(|audience| self.registry.deliver(audience, event))
            .sum();

        trace!(
            event_id = %event.id,
            event_type = %event.event_type,
            target = %event.target,
            delivered,
            "Event routed"
        );
        delivered
    }
}
