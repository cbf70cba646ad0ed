//! # Service Container
//!
//! Holds the bus and both adapters, built once and shared by reference.
//! Which reactors run is a per-instance role.
//!
//! ```text
//! RuntimeConfig ──→ EventBus (Redis or local-only)
//!               ──→ WorkflowClient ──┐
//!               ──→ EvolutionClient ─┴─→ reactors registered on the bus
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_bus::{EventBus, EventPublisher, RedisConnector, SubscriptionHandle};
use bridge_types::SystemId;
use parking_lot::Mutex;
use system_adapters::{
    CallStats, EvolutionApi, EvolutionClient, EvolutionReactor, WorkflowApi, WorkflowClient,
    WorkflowReactor,
};
use tracing::info;

use crate::container::config::RuntimeConfig;

/// The bus and the adapters, wired together.
pub struct BridgeServices {
    pub bus: Arc<EventBus>,
    pub workflow: Arc<dyn WorkflowApi>,
    pub evolution: Arc<dyn EvolutionApi>,
    /// Call counters per system, for clients that keep them.
    pub call_stats: Vec<(SystemId, Arc<CallStats>)>,
    healing_workflow_id: Option<String>,
    reactors: Vec<SystemId>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl BridgeServices {
    /// Assemble from already built parts.
    pub fn new(
        bus: Arc<EventBus>,
        workflow: Arc<dyn WorkflowApi>,
        evolution: Arc<dyn EvolutionApi>,
    ) -> Self {
        Self {
            bus,
            workflow,
            evolution,
            call_stats: Vec::new(),
            healing_workflow_id: None,
            reactors: SystemId::ALL.to_vec(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_call_stats(mut self, system: SystemId, stats: Arc<CallStats>) -> Self {
        self.call_stats.push((system, stats));
        self
    }

    #[must_use]
    pub fn with_healing_workflow(mut self, workflow_id: Option<String>) -> Self {
        self.healing_workflow_id = workflow_id;
        self
    }

    /// Systems whose reactor [`Self::register_reactors`] installs.
    #[must_use]
    pub fn with_reactors(mut self, reactors: Vec<SystemId>) -> Self {
        self.reactors = reactors;
        self
    }

    /// Build the bus and the HTTP clients from configuration.
    ///
    /// With a broker URL the bus connects to Redis (starting degraded if it
    /// is unreachable); without one it runs local-only.
    pub async fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let bus = match &config.broker_url {
            Some(url) => {
                let connector = RedisConnector::new(url)
                    .with_context(|| format!("invalid broker url {url:?}"))?;
                EventBus::connect(config.bus.clone(), Arc::new(connector))
                    .await
                    .context("failed to create event bus")?
            }
            None => {
                info!("No broker configured, running local-only");
                EventBus::local(config.bus.clone())
                    .await
                    .context("failed to create event bus")?
            }
        };

        let workflow = Arc::new(
            WorkflowClient::new(&config.workflow).context("failed to create workflow client")?,
        );
        let evolution = Arc::new(
            EvolutionClient::new(&config.evolution)
                .context("failed to create evolution client")?,
        );
        info!(
            workflow_url = workflow.base_url(),
            evolution_url = evolution.base_url(),
            "Adapters created"
        );

        Ok(Self::new(Arc::new(bus), workflow.clone(), evolution.clone())
            .with_call_stats(SystemId::Workflow, workflow.call_stats())
            .with_call_stats(SystemId::Evolution, evolution.call_stats())
            .with_healing_workflow(config.healing_workflow_id.clone())
            .with_reactors(config.reactors.clone()))
    }

    /// Register the configured reactors on the bus, one subscription each.
    /// Returns the number of subscriptions created.
    pub fn register_reactors(&self) -> Result<usize> {
        let publisher: Arc<dyn EventPublisher> = self.bus.clone();
        let mut handles = Vec::with_capacity(self.reactors.len());

        for system in &self.reactors {
            let handle = match system {
                SystemId::Workflow => {
                    let mut reactor =
                        WorkflowReactor::new(Arc::clone(&self.workflow), Arc::clone(&publisher));
                    if let Some(id) = &self.healing_workflow_id {
                        reactor = reactor.with_healing_workflow(id.clone());
                    }
                    Arc::new(reactor)
                        .register(&self.bus)
                        .context("failed to register workflow reactor")?
                }
                SystemId::Evolution => {
                    Arc::new(EvolutionReactor::new(
                        Arc::clone(&self.evolution),
                        Arc::clone(&publisher),
                    ))
                    .register(&self.bus)
                    .context("failed to register evolution reactor")?
                }
            };
            handles.push(handle);
        }

        let count = handles.len();
        self.subscriptions.lock().extend(handles);
        info!(subscriptions = count, reactors = ?self.reactors, "Reactors registered");
        Ok(count)
    }

    /// Subscriptions created by [`Self::register_reactors`].
    pub fn subscriptions(&self) -> Vec<SubscriptionHandle> {
        self.subscriptions.lock().clone()
    }
}
