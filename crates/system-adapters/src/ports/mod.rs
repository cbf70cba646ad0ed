//! # Ports Module
//!
//! Outbound call contracts of the external systems.

pub mod outbound;

pub use outbound::*;
