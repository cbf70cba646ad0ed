//! # Outbound Ports
//!
//! Typed call contracts of the two external systems. The HTTP clients in
//! [`crate::adapters`] implement them for production; the mocks below stand
//! in for them in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bridge_types::SystemId;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::domain::{
    AgentConfiguration, AgentConfigured, AgentStatus, ConnectionStatus, ExecutionState,
    IntegrationCause, IntegrationError, MutationState, MutationStatus, PerformanceRecord,
    WorkflowExecution, WorkflowStatus, WorkflowSummary,
};

/// Workflow execution engine.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Start a run of `workflow_id` with `input`.
    async fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &Value,
    ) -> Result<WorkflowExecution, IntegrationError>;

    /// Current state of an execution.
    async fn get_workflow_status(
        &self,
        execution_id: &str,
    ) -> Result<WorkflowStatus, IntegrationError>;

    /// Replace parameters of a workflow.
    async fn update_workflow_parameters(
        &self,
        workflow_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<(), IntegrationError>;

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, IntegrationError>;

    /// Connectivity probe for health reporting. Never fails.
    async fn test_connection(&self) -> ConnectionStatus;
}

/// Mutation and agent engine.
#[async_trait]
pub trait EvolutionApi: Send + Sync {
    /// Apply a new configuration to an agent.
    async fn configure_agent(
        &self,
        agent_id: &str,
        configuration: &AgentConfiguration,
    ) -> Result<AgentConfigured, IntegrationError>;

    async fn get_mutation_status(
        &self,
        mutation_id: &str,
    ) -> Result<MutationStatus, IntegrationError>;

    /// Feed the outcome of a workflow run back to the engine.
    async fn record_performance(&self, record: &PerformanceRecord)
        -> Result<(), IntegrationError>;

    async fn get_agent_status(&self, agent_id: &str) -> Result<AgentStatus, IntegrationError>;

    /// Connectivity probe for health reporting. Never fails.
    async fn test_connection(&self) -> ConnectionStatus;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

fn mock_failure(system: SystemId, operation: &'static str) -> IntegrationError {
    IntegrationError::new(
        system,
        operation,
        IntegrationCause::Connection("mock failure".to_string()),
    )
}

fn mock_probe(system: SystemId, should_fail: bool) -> ConnectionStatus {
    ConnectionStatus {
        system,
        connected: !should_fail,
        latency_ms: 0,
        version: (!should_fail).then(|| "mock".to_string()),
        error: should_fail.then(|| "mock failure".to_string()),
    }
}

/// A call received by [`MockWorkflowApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCall {
    Execute { workflow_id: String, input: Value },
    GetStatus { execution_id: String },
    UpdateParameters {
        workflow_id: String,
        parameters: Map<String, Value>,
    },
    List,
}

/// Mock workflow system. Records every call.
#[derive(Debug, Default)]
pub struct MockWorkflowApi {
    /// Fail every call with a connection error.
    pub should_fail: bool,
    calls: Mutex<Vec<WorkflowCall>>,
}

impl MockWorkflowApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<WorkflowCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: WorkflowCall, operation: &'static str) -> Result<(), IntegrationError> {
        self.calls.lock().push(call);
        if self.should_fail {
            return Err(mock_failure(SystemId::Workflow, operation));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for MockWorkflowApi {
    async fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &Value,
    ) -> Result<WorkflowExecution, IntegrationError> {
        self.record(
            WorkflowCall::Execute {
                workflow_id: workflow_id.to_string(),
                input: input.clone(),
            },
            "execute_workflow",
        )?;
        Ok(WorkflowExecution {
            execution_id: format!("exec-{}", self.calls.lock().len()),
            workflow_id: workflow_id.to_string(),
            status: ExecutionState::Running,
            started_at: Some(Utc::now()),
        })
    }

    async fn get_workflow_status(
        &self,
        execution_id: &str,
    ) -> Result<WorkflowStatus, IntegrationError> {
        self.record(
            WorkflowCall::GetStatus {
                execution_id: execution_id.to_string(),
            },
            "get_workflow_status",
        )?;
        Ok(WorkflowStatus {
            execution_id: execution_id.to_string(),
            workflow_id: "mock-workflow".to_string(),
            status: ExecutionState::Succeeded,
            started_at: None,
            finished_at: None,
            error: None,
        })
    }

    async fn update_workflow_parameters(
        &self,
        workflow_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<(), IntegrationError> {
        self.record(
            WorkflowCall::UpdateParameters {
                workflow_id: workflow_id.to_string(),
                parameters: parameters.clone(),
            },
            "update_workflow_parameters",
        )
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, IntegrationError> {
        self.record(WorkflowCall::List, "list_workflows")?;
        Ok(Vec::new())
    }

    async fn test_connection(&self) -> ConnectionStatus {
        mock_probe(SystemId::Workflow, self.should_fail)
    }
}

/// A call received by [`MockEvolutionApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionCall {
    ConfigureAgent {
        agent_id: String,
        configuration: AgentConfiguration,
    },
    GetMutationStatus { mutation_id: String },
    RecordPerformance(PerformanceRecord),
    GetAgentStatus { agent_id: String },
}

/// Mock evolution system. Records every call.
#[derive(Debug, Default)]
pub struct MockEvolutionApi {
    /// Fail every call with a connection error.
    pub should_fail: bool,
    latency: HashMap<&'static str, Duration>,
    calls: Mutex<Vec<EvolutionCall>>,
}

impl MockEvolutionApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Hold `operation` for `delay` before it is recorded.
    #[must_use]
    pub fn with_latency(mut self, operation: &'static str, delay: Duration) -> Self {
        self.latency.insert(operation, delay);
        self
    }

    pub fn calls(&self) -> Vec<EvolutionCall> {
        self.calls.lock().clone()
    }

    async fn record(
        &self,
        call: EvolutionCall,
        operation: &'static str,
    ) -> Result<(), IntegrationError> {
        if let Some(delay) = self.latency.get(operation) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().push(call);
        if self.should_fail {
            return Err(mock_failure(SystemId::Evolution, operation));
        }
        Ok(())
    }
}

#[async_trait]
impl EvolutionApi for MockEvolutionApi {
    async fn configure_agent(
        &self,
        agent_id: &str,
        configuration: &AgentConfiguration,
    ) -> Result<AgentConfigured, IntegrationError> {
        self.record(
            EvolutionCall::ConfigureAgent {
                agent_id: agent_id.to_string(),
                configuration: configuration.clone(),
            },
            "configure_agent",
        )
        .await?;
        Ok(AgentConfigured {
            agent_id: agent_id.to_string(),
            version: self.calls.lock().len() as u64,
            applied_at: Some(Utc::now()),
        })
    }

    async fn get_mutation_status(
        &self,
        mutation_id: &str,
    ) -> Result<MutationStatus, IntegrationError> {
        self.record(
            EvolutionCall::GetMutationStatus {
                mutation_id: mutation_id.to_string(),
            },
            "get_mutation_status",
        )
        .await?;
        Ok(MutationStatus {
            mutation_id: mutation_id.to_string(),
            state: MutationState::Applied,
            risk_score: None,
            applied_at: None,
        })
    }

    async fn record_performance(
        &self,
        record: &PerformanceRecord,
    ) -> Result<(), IntegrationError> {
        self.record(
            EvolutionCall::RecordPerformance(record.clone()),
            "record_performance",
        )
        .await
    }

    async fn get_agent_status(&self, agent_id: &str) -> Result<AgentStatus, IntegrationError> {
        self.record(
            EvolutionCall::GetAgentStatus {
                agent_id: agent_id.to_string(),
            },
            "get_agent_status",
        )
        .await?;
        Ok(AgentStatus {
            agent_id: agent_id.to_string(),
            state: "idle".to_string(),
            config_version: 0,
            last_mutation: None,
        })
    }

    async fn test_connection(&self) -> ConnectionStatus {
        mock_probe(SystemId::Evolution, self.should_fail)
    }
}
