//! Domain layer: errors, configuration, request/response types, event
//! bodies and call accounting. No I/O.

pub mod config;
pub mod error;
pub mod events;
pub mod evolution;
pub mod status;
pub mod workflow;

pub use config::{
    AdapterConfig, ConfigError, DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_EVOLUTION_URL,
    DEFAULT_WORKFLOW_URL,
};
pub use error::{IntegrationCause, IntegrationError, ReactorError};
pub use events::{
    AgentConfiguredBody, EventBody, HealingStartedBody, MutationAppliedBody,
    OptimizationSuggestedBody, PerformanceRecordedBody, WorkflowRunFinishedBody,
    WorkflowStartedBody, WorkflowUpdatedBody,
};
pub use evolution::{
    AgentConfiguration, AgentConfigured, AgentStatus, MutationState, MutationStatus,
    PerformanceRecord,
};
pub use status::{CallState, CallStats, CallStatsSnapshot, ConnectionStatus};
pub use workflow::{ExecutionState, WorkflowExecution, WorkflowStatus, WorkflowSummary};
