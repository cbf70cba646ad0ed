//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use async_trait::async_trait;
use bridge_types::{EventEnvelope, PartialEvent};
use std::sync::Arc;

use crate::error::BusError;

/// Trait for publishing events to the bus.
///
/// Adapters and reactors depend on this trait rather than on the concrete
/// bus so they can be exercised against a recording publisher.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Validate and publish an event.
    ///
    /// # Returns
    ///
    /// The envelope that was delivered, with its bus-assigned fields.
    async fn publish(&self, event: PartialEvent) -> Result<Arc<EventEnvelope>, BusError>;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}
