//! # System Adapters
//!
//! Integration with the two systems the bridge connects: the workflow
//! execution engine and the mutation/agent engine.
//!
//! ## Module Structure
//!
//! ```text
//! system-adapters/
//! ├── domain/     # IntegrationError, AdapterConfig, request/response and event bodies
//! ├── ports/      # WorkflowApi, EvolutionApi (+ mocks)
//! ├── adapters/   # reqwest clients implementing the ports
//! └── reactors/   # bus handlers mapping events to calls
//! ```
//!
//! ## Call semantics
//!
//! Every call runs under a fixed deadline and fails with exactly one error
//! type, [`IntegrationError`]. There are no retries; retry policy belongs
//! to the caller. Reactors log failures and never raise them into the bus.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod reactors;

pub use adapters::{EvolutionClient, WorkflowClient};
pub use domain::{
    AdapterConfig, AgentConfiguration, AgentConfigured, AgentStatus, CallState, CallStats,
    CallStatsSnapshot, ConfigError, ConnectionStatus, EventBody, ExecutionState,
    IntegrationCause, IntegrationError, MutationState, MutationStatus, PerformanceRecord,
    ReactorError, WorkflowExecution, WorkflowStatus, WorkflowSummary,
};
pub use ports::{
    EvolutionApi, EvolutionCall, MockEvolutionApi, MockWorkflowApi, WorkflowApi, WorkflowCall,
};
pub use reactors::{EvolutionReactor, WorkflowReactor};
