//! Workflow-side reactor: applies evolution decisions to workflows.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_bus::{
    BusError, EventBus, EventHandler, EventPublisher, HandlerResult, SubscriptionHandle,
};
use bridge_types::{EventEnvelope, EventType, SystemId};
use tracing::{debug, info, warn};

use super::{publish_follow_up, register_on};
use crate::domain::{
    EventBody, HealingStartedBody, MutationAppliedBody, ReactorError, WorkflowStartedBody,
    WorkflowUpdatedBody,
};
use crate::ports::WorkflowApi;

/// Reacts to evolution events on behalf of the workflow system.
///
/// - `mutation.applied` → `update_workflow_parameters` → `workflow.updated`
/// - `healing.started` → `execute_workflow` of the healing workflow →
///   `workflow.started` (skipped when no healing workflow is configured)
pub struct WorkflowReactor {
    api: Arc<dyn WorkflowApi>,
    publisher: Arc<dyn EventPublisher>,
    healing_workflow_id: Option<String>,
}

impl WorkflowReactor {
    /// Event kinds this reactor acts on.
    pub const HANDLED: [EventType; 2] = [EventType::MutationApplied, EventType::HealingStarted];

    pub fn new(api: Arc<dyn WorkflowApi>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            api,
            publisher,
            healing_workflow_id: None,
        }
    }

    /// Workflow to run when healing starts. Empty means none.
    #[must_use]
    pub fn with_healing_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.healing_workflow_id = Some(workflow_id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    /// Subscribe on the workflow audience.
    pub fn register(self: Arc<Self>, bus: &EventBus) -> Result<SubscriptionHandle, BusError> {
        register_on(bus, SystemId::Workflow, self)
    }

    /// React to one event. Returns the follow-up event, if one was
    /// published.
    pub async fn react(
        &self,
        event: &EventEnvelope,
    ) -> Result<Option<Arc<EventEnvelope>>, ReactorError> {
        if event.source != SystemId::Evolution || !Self::HANDLED.contains(&event.event_type) {
            return Ok(None);
        }
        match event.event_type {
            EventType::MutationApplied => self.on_mutation_applied(event).await.map(Some),
            EventType::HealingStarted => self.on_healing_started(event).await,
            _ => Ok(None),
        }
    }

    async fn on_mutation_applied(
        &self,
        event: &EventEnvelope,
    ) -> Result<Arc<EventEnvelope>, ReactorError> {
        let body = MutationAppliedBody::from_envelope(
            event,
            SystemId::Workflow,
            "update_workflow_parameters",
        )?;

        self.api
            .update_workflow_parameters(&body.workflow_id, &body.parameters)
            .await?;

        publish_follow_up(
            self.publisher.as_ref(),
            event,
            EventType::WorkflowUpdated,
            SystemId::Workflow,
            SystemId::Evolution,
            &WorkflowUpdatedBody {
                workflow_id: body.workflow_id,
                mutation_id: body.mutation_id,
            },
        )
        .await
    }

    async fn on_healing_started(
        &self,
        event: &EventEnvelope,
    ) -> Result<Option<Arc<EventEnvelope>>, ReactorError> {
        let body = HealingStartedBody::from_envelope(event, SystemId::Workflow, "execute_workflow")?;

        let Some(workflow_id) = self.healing_workflow_id.as_deref() else {
            debug!(
                event_id = %event.id,
                reason = %body.reason,
                "no healing workflow configured, ignoring healing.started"
            );
            return Ok(None);
        };

        let execution = self.api.execute_workflow(workflow_id, &body.context).await?;
        info!(
            workflow_id,
            execution_id = %execution.execution_id,
            reason = %body.reason,
            "healing workflow started"
        );

        publish_follow_up(
            self.publisher.as_ref(),
            event,
            EventType::WorkflowStarted,
            SystemId::Workflow,
            SystemId::Evolution,
            &WorkflowStartedBody {
                workflow_id: execution.workflow_id,
                execution_id: execution.execution_id,
                trigger: event.event_type.as_str().to_string(),
            },
        )
        .await
        .map(Some)
    }
}

#[async_trait]
impl EventHandler for WorkflowReactor {
    async fn handle(&self, event: Arc<EventEnvelope>) -> HandlerResult {
        match self.react(&event).await {
            Ok(Some(follow_up)) => debug!(
                event_id = %event.id,
                follow_up_id = %follow_up.id,
                follow_up_type = %follow_up.event_type,
                "workflow reactor published follow-up"
            ),
            Ok(None) => {}
            Err(e) => warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "workflow reactor failed"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "workflow-reactor"
    }
}
