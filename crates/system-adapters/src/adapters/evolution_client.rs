//! Evolution system client.
//!
//! Implements [`EvolutionApi`] over the engine's REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `configure_agent` | `PUT /api/agents/{id}/config` |
//! | `get_mutation_status` | `GET /api/mutations/{id}` |
//! | `record_performance` | `POST /api/performance` |
//! | `get_agent_status` | `GET /api/agents/{id}` |
//! | `test_connection` | `GET /health` |

use std::sync::Arc;

use async_trait::async_trait;
use bridge_types::SystemId;
use reqwest::Method;
use serde::de::IgnoredAny;
use tracing::{debug, info};

use super::http::{path_segment, SystemHttpClient};
use crate::domain::{
    AdapterConfig, AgentConfiguration, AgentConfigured, AgentStatus, CallStats, ConfigError,
    ConnectionStatus, IntegrationError, MutationStatus, PerformanceRecord,
};
use crate::ports::EvolutionApi;

const HEALTH_PATH: &str = "/health";

/// HTTP client of the mutation and agent engine.
pub struct EvolutionClient {
    http: SystemHttpClient,
}

impl EvolutionClient {
    pub fn new(config: &AdapterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: SystemHttpClient::new(SystemId::Evolution, config)?,
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
impl EvolutionApi for EvolutionClient {
    async fn configure_agent(
        &self,
        agent_id: &str,
        configuration: &AgentConfiguration,
    ) -> Result<AgentConfigured, IntegrationError> {
        const OP: &str = "configure_agent";
        let id = path_segment(self.http.system(), OP, "agent id", agent_id)?;

        let configured: AgentConfigured = self
            .http
            .send_json(OP, Method::PUT, &format!("/api/agents/{id}/config"), configuration)
            .await?;
        info!(
            agent_id = %configured.agent_id,
            version = configured.version,
            "agent configured"
        );
        Ok(configured)
    }

    async fn get_mutation_status(
        &self,
        mutation_id: &str,
    ) -> Result<MutationStatus, IntegrationError> {
        const OP: &str = "get_mutation_status";
        let id = path_segment(self.http.system(), OP, "mutation id", mutation_id)?;
        self.http.get(OP, &format!("/api/mutations/{id}")).await
    }

    async fn record_performance(
        &self,
        record: &PerformanceRecord,
    ) -> Result<(), IntegrationError> {
        let _: IgnoredAny = self
            .http
            .send_json("record_performance", Method::POST, "/api/performance", record)
            .await?;
        debug!(
            workflow_id = %record.workflow_id,
            execution_id = %record.execution_id,
            success = record.success,
            "performance recorded"
        );
        Ok(())
    }

    async fn get_agent_status(&self, agent_id: &str) -> Result<AgentStatus, IntegrationError> {
        const OP: &str = "get_agent_status";
        let id = path_segment(self.http.system(), OP, "agent id", agent_id)?;
        self.http.get(OP, &format!("/api/agents/{id}")).await
    }

    async fn test_connection(&self) -> ConnectionStatus {
        self.http.probe(HEALTH_PATH).await
    }
}
