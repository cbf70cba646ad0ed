//! # Bridge Bus
//!
//! Event bus connecting the workflow and evolution systems.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  publish   ┌───────────┐   route   ┌─────────────────────┐
//! │ producer │ ─────────→ │ validator │ ────────→ │ router / registry   │──→ subscribers
//! └──────────┘            └───────────┘     │     └─────────────────────┘
//!                                           │ dispatch
//!                                           ▼
//!                                    ┌─────────────┐  Connected  ┌────────┐
//!                                    │  transport  │ ──────────→ │ broker │
//!                                    └─────────────┘             └────────┘
//!                                           │ Degraded
//!                                           ▼
//!                                  ┌──────────────────┐
//!                                  │ resilience queue │ ── drained on reconnect
//!                                  └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Invalid events are rejected before any delivery.
//! - Local subscribers receive every valid event exactly once, in publish
//!   order, whatever the broker state.
//! - Broker failures never reach the publisher; they switch the transport
//!   to degraded mode and the remote copies are buffered.
//! - A failing or panicking subscriber affects nobody else.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod broker;
pub mod bus;
pub mod config;
pub mod error;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod router;
pub mod subscriber;
pub mod transport;
pub mod validator;

pub use broker::{BrokerConnection, BrokerConnector, BrokerMessage, MemoryBroker};
#[cfg(feature = "redis")]
pub use broker::RedisConnector;
pub use bus::{BusStats, EventBus};
pub use config::{BusConfig, ConfigError, DEFAULT_CHANNEL_PREFIX};
pub use error::{BusError, TransportError};
pub use publisher::EventPublisher;
pub use queue::{QueuedEntryInfo, ResilienceQueue};
pub use subscriber::{
    Audience, EventHandler, EventSelector, EventStream, FnHandler, HandlerError, HandlerResult,
    SubscriptionHandle, SubscriptionId,
};
pub use transport::{TransportState, WireMessage};
pub use validator::EnvelopeValidator;
