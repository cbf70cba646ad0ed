//! Evolution-side reactor: feeds workflow outcomes back into evolution.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_bus::{
    BusError, EventBus, EventHandler, EventPublisher, HandlerResult, SubscriptionHandle,
};
use bridge_types::{EventEnvelope, EventType, SystemId, Target};
use tracing::{debug, warn};

use super::{publish_follow_up, register_on};
use crate::domain::{
    AgentConfiguration, AgentConfiguredBody, EventBody, OptimizationSuggestedBody,
    PerformanceRecord, PerformanceRecordedBody, ReactorError, WorkflowRunFinishedBody,
};
use crate::ports::EvolutionApi;

/// Reacts to workflow events on behalf of the evolution system.
///
/// - `workflow.completed` / `workflow.failed` → `record_performance` →
///   `performance.recorded` to both systems
/// - `optimization.suggested` → `configure_agent` → `agent.configured`
pub struct EvolutionReactor {
    api: Arc<dyn EvolutionApi>,
    publisher: Arc<dyn EventPublisher>,
}

impl EvolutionReactor {
    /// Event kinds this reactor acts on.
    pub const HANDLED: [EventType; 3] = [
        EventType::WorkflowCompleted,
        EventType::WorkflowFailed,
        EventType::OptimizationSuggested,
    ];

    pub fn new(api: Arc<dyn EvolutionApi>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { api, publisher }
    }

    /// Subscribe on the evolution audience.
    pub fn register(self: Arc<Self>, bus: &EventBus) -> Result<SubscriptionHandle, BusError> {
        register_on(bus, SystemId::Evolution, self)
    }

    /// React to one event. Returns the follow-up event, if one was
    /// published.
    pub async fn react(
        &self,
        event: &EventEnvelope,
    ) -> Result<Option<Arc<EventEnvelope>>, ReactorError> {
        if event.source != SystemId::Workflow || !Self::HANDLED.contains(&event.event_type) {
            return Ok(None);
        }
        let follow_up = match event.event_type {
            EventType::WorkflowCompleted | EventType::WorkflowFailed => {
                self.on_run_finished(event).await?
            }
            EventType::OptimizationSuggested => self.on_optimization_suggested(event).await?,
            _ => return Ok(None),
        };
        Ok(Some(follow_up))
    }

    async fn on_run_finished(
        &self,
        event: &EventEnvelope,
    ) -> Result<Arc<EventEnvelope>, ReactorError> {
        let body =
            WorkflowRunFinishedBody::from_envelope(event, SystemId::Evolution, "record_performance")?;
        let success = event.event_type == EventType::WorkflowCompleted;

        let mut metrics = body.metrics;
        if let Some(error) = body.error {
            metrics.insert("error".to_string(), error.into());
        }
        let record = PerformanceRecord {
            workflow_id: body.workflow_id,
            execution_id: body.execution_id,
            success,
            duration_ms: body.duration_ms,
            metrics,
            recorded_at: event.timestamp,
        };
        self.api.record_performance(&record).await?;

        publish_follow_up(
            self.publisher.as_ref(),
            event,
            EventType::PerformanceRecorded,
            SystemId::Evolution,
            Target::Both,
            &PerformanceRecordedBody {
                workflow_id: record.workflow_id,
                execution_id: record.execution_id,
                success,
            },
        )
        .await
    }

    async fn on_optimization_suggested(
        &self,
        event: &EventEnvelope,
    ) -> Result<Arc<EventEnvelope>, ReactorError> {
        let body =
            OptimizationSuggestedBody::from_envelope(event, SystemId::Evolution, "configure_agent")?;

        let configured = self
            .api
            .configure_agent(
                &body.agent_id,
                &AgentConfiguration {
                    parameters: body.parameters,
                    reason: body.reason,
                },
            )
            .await?;

        publish_follow_up(
            self.publisher.as_ref(),
            event,
            EventType::AgentConfigured,
            SystemId::Evolution,
            SystemId::Workflow,
            &AgentConfiguredBody {
                agent_id: configured.agent_id,
                version: configured.version,
            },
        )
        .await
    }
}

#[async_trait]
impl EventHandler for EvolutionReactor {
    async fn handle(&self, event: Arc<EventEnvelope>) -> HandlerResult {
        match self.react(&event).await {
            Ok(Some(follow_up)) => debug!(
                event_id = %event.id,
                follow_up_id = %follow_up.id,
                follow_up_type = %follow_up.event_type,
                "evolution reactor published follow-up"
            ),
            Ok(None) => {}
            Err(e) => warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "evolution reactor failed"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "evolution-reactor"
    }
}
