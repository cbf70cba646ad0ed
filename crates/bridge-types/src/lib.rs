//! # Bridge Types
//!
//! Shared vocabulary of the cross-system event bridge.
//!
//! ## Contents
//!
//! - [`SystemId`] / [`Target`]: who owns an event and who should see it
//! - [`EventType`] / [`Priority`]: the closed set of event kinds and their
//!   static classification
//! - [`PartialEvent`] / [`EventEnvelope`]: producer input and the validated
//!   record exchanged over the bus
//! - [`ValidationError`]: why an input was rejected

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod envelope;
pub mod errors;
pub mod event;
pub mod system;

pub use envelope::{EventEnvelope, EventPayload, PartialEvent};
pub use errors::ValidationError;
pub use event::{EventType, Priority};
pub use system::{SystemId, Target, BROADCAST_TARGET};

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;
