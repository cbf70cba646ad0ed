//! Workflow system client.
//!
//! Implements [`WorkflowApi`] over the engine's REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `execute_workflow` | `POST /api/v1/workflows/{id}/execute` |
//! | `get_workflow_status` | `GET /api/v1/executions/{id}` |
//! | `update_workflow_parameters` | `PATCH /api/v1/workflows/{id}/parameters` |
//! | `list_workflows` | `GET /api/v1/workflows` |
//! | `test_connection` | `GET /healthz` |

use std::sync::Arc;

use async_trait::async_trait;
use bridge_types::SystemId;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde_json::{Map, Value};
use tracing::info;

use super::http::{path_segment, SystemHttpClient};
use crate::domain::workflow::{ExecuteRequest, ParametersRequest, WorkflowList};
use crate::domain::{
    AdapterConfig, CallStats, ConfigError, ConnectionStatus, IntegrationError, WorkflowExecution,
    WorkflowStatus, WorkflowSummary,
};
use crate::ports::WorkflowApi;

const HEALTH_PATH: &str = "/healthz";

/// HTTP client of the workflow execution engine.
pub struct WorkflowClient {
    http: SystemHttpClient,
}

impl WorkflowClient {
    pub fn new(config: &AdapterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: SystemHttpClient::new(SystemId::Workflow, config)?,
        })
    }

    /// Call counters of this client.
    pub fn call_stats(&self) -> Arc<CallStats> {
        self.http.stats()
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait]
impl WorkflowApi for WorkflowClient {
    async fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &Value,
    ) -> Result<WorkflowExecution, IntegrationError> {
        const OP: &str = "execute_workflow";
        let id = path_segment(self.http.system(), OP, "workflow id", workflow_id)?;

        let execution: WorkflowExecution = self
            .http
            .send_json(
                OP,
                Method::POST,
                &format!("/api/v1/workflows/{id}/execute"),
                &ExecuteRequest { input },
            )
            .await?;
        info!(
            workflow_id = %execution.workflow_id,
            execution_id = %execution.execution_id,
            "workflow execution started"
        );
        Ok(execution)
    }

    async fn get_workflow_status(
        &self,
        execution_id: &str,
    ) -> Result<WorkflowStatus, IntegrationError> {
        const OP: &str = "get_workflow_status";
        let id = path_segment(self.http.system(), OP, "execution id", execution_id)?;
        self.http.get(OP, &format!("/api/v1/executions/{id}")).await
    }

    async fn update_workflow_parameters(
        &self,
        workflow_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<(), IntegrationError> {
        const OP: &str = "update_workflow_parameters";
        let id = path_segment(self.http.system(), OP, "workflow id", workflow_id)?;

        let _: IgnoredAny = self
            .http
            .send_json(
                OP,
                Method::PATCH,
                &format!("/api/v1/workflows/{id}/parameters"),
                &ParametersRequest { parameters },
            )
            .await?;
        info!(workflow_id = id, count = parameters.len(), "workflow parameters updated");
        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, IntegrationError> {
        let list: WorkflowList = self.http.get("list_workflows", "/api/v1/workflows").await?;
        Ok(list.data)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        self.http.probe(HEALTH_PATH).await
    }
}
