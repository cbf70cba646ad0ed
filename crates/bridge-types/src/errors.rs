//! # Validation Errors
//!
//! Errors raised while turning a producer's partial event into an envelope.
//! A validation failure is local and immediate: nothing is delivered.

use thiserror::Error;

/// Reasons an event is rejected before delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The event kind is not part of the closed set.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The source is not a known system.
    #[error("unknown source system: {0}")]
    UnknownSystem(String),

    /// The broadcast sentinel was used as a source.
    #[error("broadcast sentinel cannot be used as a source")]
    BroadcastSource,

    /// The target is neither a known system nor the broadcast sentinel.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// The payload was present but carried no schema identifier.
    #[error("payload schema identifier is empty")]
    EmptySchema,
}
