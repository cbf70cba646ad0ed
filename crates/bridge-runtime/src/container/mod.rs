//! # Container
//!
//! Configuration loading and construction of the bus and adapters.

pub mod config;
pub mod services;

pub use config::{ConfigError, RuntimeConfig, DEFAULT_HEALTH_INTERVAL};
pub use services::BridgeServices;
