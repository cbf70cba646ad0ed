//! # Event Bodies
//!
//! Typed payload bodies of the events the adapters consume and produce.
//! The bus treats payloads as opaque; their shape is enforced here, at the
//! adapter boundary, keyed by schema id.

use bridge_types::{EventEnvelope, EventPayload, SystemId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::IntegrationError;

/// A payload body with a fixed schema id.
pub trait EventBody: Serialize + DeserializeOwned {
    const SCHEMA: &'static str;

    /// Wrap the body into a bus payload.
    fn to_payload(&self) -> Result<EventPayload, serde_json::Error> {
        EventPayload::from_typed(Self::SCHEMA, self)
    }

    /// Extract the body from an envelope, checking the schema id first.
    ///
    /// `system` and `operation` name the call the body was meant for.
    fn from_envelope(
        event: &EventEnvelope,
        system: SystemId,
        operation: &'static str,
    ) -> Result<Self, IntegrationError> {
        if event.payload.schema != Self::SCHEMA {
            return Err(IntegrationError::invalid_input(
                system,
                operation,
                format!(
                    "expected payload schema {}, got {}",
                    Self::SCHEMA,
                    event.payload.schema
                ),
            ));
        }
        event.payload.parse().map_err(|e| {
            IntegrationError::invalid_input(
                system,
                operation,
                format!("malformed {} payload: {e}", Self::SCHEMA),
            )
        })
    }
}

// =============================================================================
// CONSUMED
// =============================================================================

/// A mutation changed parameters a workflow depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAppliedBody {
    pub mutation_id: String,
    pub workflow_id: String,
    pub parameters: Map<String, Value>,
}

impl EventBody for MutationAppliedBody {
    const SCHEMA: &'static str = "mutation.applied/v1";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingStartedBody {
    pub reason: String,
    #[serde(default)]
    pub component: Option<String>,
    /// Passed to the healing workflow as its input.
    #[serde(default)]
    pub context: Value,
}

impl EventBody for HealingStartedBody {
    const SCHEMA: &'static str = "healing.started/v1";
}

/// A workflow run finished, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunFinishedBody {
    pub workflow_id: String,
    pub execution_id: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EventBody for WorkflowRunFinishedBody {
    const SCHEMA: &'static str = "workflow.run/v1";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationSuggestedBody {
    pub agent_id: String,
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl EventBody for OptimizationSuggestedBody {
    const SCHEMA: &'static str = "optimization.suggested/v1";
}

// =============================================================================
// PRODUCED
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdatedBody {
    pub workflow_id: String,
    pub mutation_id: String,
}

impl EventBody for WorkflowUpdatedBody {
    const SCHEMA: &'static str = "workflow.updated/v1";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStartedBody {
    pub workflow_id: String,
    pub execution_id: String,
    /// Event kind that caused the run.
    pub trigger: String,
}

impl EventBody for WorkflowStartedBody {
    const SCHEMA: &'static str = "workflow.started/v1";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecordedBody {
    pub workflow_id: String,
    pub execution_id: String,
    pub success: bool,
}

impl EventBody for PerformanceRecordedBody {
    const SCHEMA: &'static str = "performance.recorded/v1";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfiguredBody {
    pub agent_id: String,
    pub version: u64,
}

impl EventBody for AgentConfiguredBody {
    const SCHEMA: &'static str = "agent.configured/v1";
}
