//! # Envelope Validator
//!
//! Turns a producer's [`PartialEvent`] into an [`EventEnvelope`].
//!
//! The validator is the only place envelopes are minted: it generates the
//! id, stamps the timestamp and derives the priority, so none of these can be
//! spoofed by a producer.

use bridge_types::{
    EventEnvelope, EventType, PartialEvent, SystemId, Target, ValidationError,
};
use chrono::Utc;
use uuid::Uuid;

/// Stateless envelope validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeValidator;

impl EnvelopeValidator {
    /// Create a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate and normalize a partial event.
    ///
    /// Presence of every required field is checked before any field is
    /// parsed, so the reported error always names the first absent field.
    pub fn validate(&self, event: PartialEvent) -> Result<EventEnvelope, ValidationError> {
        let event_type = required(event.event_type, "type")?;
        let source = required(event.source, "source")?;
        let target = required(event.target, "target")?;
        let payload = event.payload.ok_or(ValidationError::MissingField("payload"))?;

        if payload.body.is_null() {
            return Err(ValidationError::MissingField("payload"));
        }
        if payload.schema.trim().is_empty() {
            return Err(ValidationError::EmptySchema);
        }

        let event_type: EventType = event_type.parse()?;
        let source: SystemId = source.parse()?;
        let target: Target = target.parse()?;

        Ok(EventEnvelope {
            id: Uuid::new_v4(),
            event_type,
            source,
            target,
            payload,
            correlation_id: event.correlation_id.filter(|id| !id.is_empty()),
            priority: event_type.priority(),
            timestamp: Utc::now(),
        })
    }
}

/// Empty strings count as absent.
fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ValidationError::MissingField(field))
}
