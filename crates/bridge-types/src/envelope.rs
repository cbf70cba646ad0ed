//! # Event Envelope
//!
//! The unit of communication on the bus.
//!
//! ## Field Authority
//!
//! - **Producer-supplied**: `type`, `source`, `target`, `payload`, `correlationId`.
//! - **Bus-assigned**: `id`, `timestamp`, `priority`. Producers cannot set
//!   these; [`PartialEvent`] has no field for them.
//!
//! Envelopes are immutable once built and are shared between subscribers as
//! `Arc<EventEnvelope>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{EventType, Priority};
use crate::system::{SystemId, Target};

/// Opaque, schema-identified payload.
///
/// The bus only checks that a payload is present. Structural validation of
/// `body` belongs to the adapter that consumes the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Schema identifier, e.g. `mutation.applied/v1`.
    pub schema: String,
    /// Type-erased body.
    pub body: serde_json::Value,
}

impl EventPayload {
    /// Create a payload from a schema id and a JSON body.
    pub fn new(schema: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            schema: schema.into(),
            body,
        }
    }

    /// Serialize a typed body under a schema id.
    pub fn from_typed<T: Serialize>(
        schema: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(schema, serde_json::to_value(body)?))
    }

    /// Deserialize the body into a typed value.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// An event as handed over by a producer, before validation.
///
/// Every field is optional so that malformed input can be represented and
/// rejected by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialEvent {
    /// Event kind wire name.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Owning system wire name.
    pub source: Option<String>,
    /// Target system wire name or `both`.
    pub target: Option<String>,
    /// Payload.
    pub payload: Option<EventPayload>,
    /// Correlation token for ordered, causally related sequences.
    pub correlation_id: Option<String>,
}

impl PartialEvent {
    /// Build a well-formed partial event from typed parts.
    pub fn new(
        event_type: EventType,
        source: SystemId,
        target: impl Into<Target>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_type: Some(event_type.as_str().to_string()),
            source: Some(source.as_str().to_string()),
            target: Some(target.into().as_str().to_string()),
            payload: Some(payload),
            correlation_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A validated, fully populated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Bus-generated unique id.
    pub id: Uuid,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Owning system.
    pub source: SystemId,
    /// Routing target.
    pub target: Target,
    /// Opaque payload.
    pub payload: EventPayload,
    /// Correlation token, if the producer supplied one.
    pub correlation_id: Option<String>,
    /// Derived from `event_type`.
    pub priority: Priority,
    /// Assigned at validation time.
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Correlation id of this event, or its own id when none was supplied.
    ///
    /// Follow-up events use this to stay attached to the chain that caused
    /// them.
    #[must_use]
    pub fn chain_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}
