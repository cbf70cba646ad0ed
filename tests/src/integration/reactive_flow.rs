//! # Reactive Flows
//!
//! Events published on the bus turn into calls against the two systems and
//! into follow-up events on the same correlation chain:
//!
//! ```text
//! evolution ──mutation.applied──→ WorkflowReactor ──PATCH──→ workflow
//!                                        └──workflow.updated──→ evolution
//! workflow ──workflow.completed─→ EvolutionReactor ──POST──→ evolution
//!                                        └──performance.recorded──→ both
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::Path;
    use axum::routing::post;
    use axum::{Json, Router};
    use bridge_bus::{Audience, EventBus, EventSelector, EventStream, MemoryBroker};
    use bridge_runtime::{BridgeRuntime, BridgeServices};
    use bridge_types::{EventEnvelope, EventType, PartialEvent, SystemId, Target};
    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};
    use system_adapters::domain::{
        HealingStartedBody, MutationAppliedBody, OptimizationSuggestedBody,
        PerformanceRecordedBody, WorkflowRunFinishedBody, WorkflowStartedBody,
        WorkflowUpdatedBody,
    };
    use system_adapters::{
        AdapterConfig, EventBody, EvolutionApi, EvolutionCall, MockEvolutionApi,
        MockWorkflowApi, WorkflowApi, WorkflowCall, WorkflowClient,
    };

    use crate::integration::adapters::server::serve;
    use crate::integration::support::{assert_quiet, bus_config, eventually, take};
    use tokio::time::sleep;

    struct Harness {
        runtime: BridgeRuntime,
        workflow: Arc<MockWorkflowApi>,
        evolution: Arc<MockEvolutionApi>,
    }

    async fn harness(workflow: MockWorkflowApi, evolution: MockEvolutionApi) -> Harness {
        let bus = Arc::new(EventBus::local(bus_config()).await.unwrap());
        let workflow = Arc::new(workflow);
        let evolution = Arc::new(evolution);
        let services = BridgeServices::new(
            bus,
            Arc::clone(&workflow) as Arc<dyn WorkflowApi>,
            Arc::clone(&evolution) as Arc<dyn EvolutionApi>,
        )
        .with_healing_workflow(Some("heal-1".to_string()));
        let runtime = BridgeRuntime::new(services, Duration::from_secs(3600));
        runtime.start().unwrap();
        Harness {
            runtime,
            workflow,
            evolution,
        }
    }

    /// A runtime on a shared broker running only `reactors`.
    async fn instance(broker: &MemoryBroker, reactors: Vec<SystemId>) -> Harness {
        let bus = Arc::new(
            EventBus::connect(bus_config(), Arc::new(broker.clone()))
                .await
                .unwrap(),
        );
        let workflow = Arc::new(MockWorkflowApi::new());
        let evolution = Arc::new(MockEvolutionApi::new());
        let services = BridgeServices::new(
            bus,
            Arc::clone(&workflow) as Arc<dyn WorkflowApi>,
            Arc::clone(&evolution) as Arc<dyn EvolutionApi>,
        )
        .with_reactors(reactors);
        let runtime = BridgeRuntime::new(services, Duration::from_secs(3600));
        runtime.start().unwrap();
        Harness {
            runtime,
            workflow,
            evolution,
        }
    }

    fn forwarded(broker: &MemoryBroker, kind: EventType) -> usize {
        broker
            .published_envelopes()
            .iter()
            .filter(|e| e.event_type == kind)
            .count()
    }

    fn body_event<B: EventBody>(
        event_type: EventType,
        source: SystemId,
        target: impl Into<Target>,
        body: &B,
    ) -> PartialEvent {
        PartialEvent::new(event_type, source, target, body.to_payload().unwrap())
    }

    fn follow_ups(bus: &EventBus, kind: EventType, audience: SystemId) -> EventStream {
        bus.stream(EventSelector::Only(kind), Audience::System(audience))
            .unwrap()
    }

    fn mutation_applied() -> MutationAppliedBody {
        let mut parameters = Map::new();
        parameters.insert("batchSize".into(), json!(64));
        MutationAppliedBody {
            mutation_id: "m-1".into(),
            workflow_id: "wf-1".into(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_mutation_applied_updates_workflow() {
        let h = harness(MockWorkflowApi::new(), MockEvolutionApi::new()).await;
        let bus = h.runtime.bus();
        let mut updates = follow_ups(bus, EventType::WorkflowUpdated, SystemId::Evolution);

        let cause = bus
            .publish(
                body_event(
                    EventType::MutationApplied,
                    SystemId::Evolution,
                    SystemId::Workflow,
                    &mutation_applied(),
                )
                .with_correlation_id("chain-7"),
            )
            .unwrap();

        let update = take(&mut updates, 1).await.remove(0);
        assert_eq!(update.source, SystemId::Workflow);
        assert_eq!(update.correlation_id.as_deref(), Some("chain-7"));
        let body: WorkflowUpdatedBody = update.payload.parse().unwrap();
        assert_eq!(body.workflow_id, "wf-1");
        assert_eq!(body.mutation_id, "m-1");

        assert_eq!(
            h.workflow.calls(),
            vec![WorkflowCall::UpdateParameters {
                workflow_id: "wf-1".into(),
                parameters: mutation_applied().parameters,
            }]
        );
        assert_ne!(cause.id, update.id);

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_runs_feed_performance_back() {
        let h = harness(MockWorkflowApi::new(), MockEvolutionApi::new()).await;
        let bus = h.runtime.bus();
        let mut recorded = bus
            .stream(
                EventSelector::Only(EventType::PerformanceRecorded),
                Audience::Broadcast,
            )
            .unwrap();

        let completed = bus
            .publish(body_event(
                EventType::WorkflowCompleted,
                SystemId::Workflow,
                SystemId::Evolution,
                &WorkflowRunFinishedBody {
                    workflow_id: "wf-1".into(),
                    execution_id: "x-1".into(),
                    duration_ms: Some(1200),
                    metrics: Map::new(),
                    error: None,
                },
            ))
            .unwrap();
        bus.publish(body_event(
            EventType::WorkflowFailed,
            SystemId::Workflow,
            SystemId::Evolution,
            &WorkflowRunFinishedBody {
                workflow_id: "wf-1".into(),
                execution_id: "x-2".into(),
                duration_ms: None,
                metrics: Map::new(),
                error: Some("node 3 crashed".into()),
            },
        ))
        .unwrap();

        let events = take(&mut recorded, 2).await;
        let bodies: Vec<PerformanceRecordedBody> =
            events.iter().map(|e| e.payload.parse().unwrap()).collect();
        let mut outcomes: Vec<_> = bodies
            .iter()
            .map(|b| (b.execution_id.as_str(), b.success))
            .collect();
        outcomes.sort();
        assert_eq!(outcomes, vec![("x-1", true), ("x-2", false)]);
        let from_completed = events
            .iter()
            .find(|e| e.payload.parse::<PerformanceRecordedBody>().unwrap().success)
            .unwrap();
        assert_eq!(from_completed.chain_id(), completed.id.to_string());
        assert_eq!(from_completed.target, Target::Both);

        let calls = h.evolution.calls();
        assert_eq!(calls.len(), 2);
        let failed = calls
            .iter()
            .find_map(|call| match call {
                EvolutionCall::RecordPerformance(record) if !record.success => Some(record),
                _ => None,
            })
            .unwrap();
        assert_eq!(failed.metrics.get("error"), Some(&json!("node 3 crashed")));

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_optimization_configures_agent() {
        let h = harness(MockWorkflowApi::new(), MockEvolutionApi::new()).await;
        let bus = h.runtime.bus();
        let mut configured = follow_ups(bus, EventType::AgentConfigured, SystemId::Workflow);

        let mut parameters = Map::new();
        parameters.insert("temperature".into(), json!(0.2));
        bus.publish(body_event(
            EventType::OptimizationSuggested,
            SystemId::Workflow,
            SystemId::Evolution,
            &OptimizationSuggestedBody {
                agent_id: "agent-4".into(),
                parameters: parameters.clone(),
                reason: Some("latency regression".into()),
            },
        ))
        .unwrap();

        let event = take(&mut configured, 1).await.remove(0);
        assert_eq!(event.source, SystemId::Evolution);
        match h.evolution.calls().as_slice() {
            [EvolutionCall::ConfigureAgent {
                agent_id,
                configuration,
            }] => {
                assert_eq!(agent_id, "agent-4");
                assert_eq!(configuration.parameters, parameters);
            }
            other => panic!("unexpected calls: {other:?}"),
        }

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_adapter_failure_stays_out_of_the_bus() {
        let h = harness(MockWorkflowApi::failing(), MockEvolutionApi::new()).await;
        let bus = h.runtime.bus();
        let mut updates = follow_ups(bus, EventType::WorkflowUpdated, SystemId::Evolution);
        let mut workflow_side = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        bus.publish(body_event(
            EventType::MutationApplied,
            SystemId::Evolution,
            SystemId::Workflow,
            &mutation_applied(),
        ))
        .unwrap();
        eventually("the failing call to be attempted", || {
            h.workflow.calls().len() == 1
        })
        .await;
        assert_quiet(&mut updates).await;

        // The bus keeps delivering.
        let later = bus
            .publish(body_event(
                EventType::MutationApplied,
                SystemId::Evolution,
                SystemId::Workflow,
                &mutation_applied(),
            ))
            .unwrap();
        let seen = take(&mut workflow_side, 2).await;
        assert_eq!(seen[1].id, later.id);

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_from_wrong_source_are_ignored() {
        let h = harness(MockWorkflowApi::new(), MockEvolutionApi::new()).await;
        let bus = h.runtime.bus();
        let mut everything = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        // Mutations owned by the workflow side are not acted upon.
        bus.publish(body_event(
            EventType::MutationApplied,
            SystemId::Workflow,
            SystemId::Workflow,
            &mutation_applied(),
        ))
        .unwrap();
        take(&mut everything, 1).await;
        assert_quiet(&mut everything).await;
        assert!(h.workflow.calls().is_empty());

        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_healing_runs_workflow_over_http() {
        let received: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let sink = Arc::clone(&received);
        let url = serve(Router::new().route(
            "/api/v1/workflows/:id/execute",
            post(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push((id.clone(), body));
                    Json(json!({
                        "executionId": "x-77",
                        "workflowId": id,
                        "status": "running"
                    }))
                }
            }),
        ))
        .await;

        let bus = Arc::new(EventBus::local(bus_config()).await.unwrap());
        let client = WorkflowClient::new(&AdapterConfig::new(url)).unwrap();
        let stats = client.call_stats();
        let services = BridgeServices::new(
            Arc::clone(&bus),
            Arc::new(client),
            Arc::new(MockEvolutionApi::new()),
        )
        .with_call_stats(SystemId::Workflow, Arc::clone(&stats))
        .with_healing_workflow(Some("heal-1".to_string()));
        let runtime = BridgeRuntime::new(services, Duration::from_secs(3600));
        runtime.start().unwrap();

        let mut started = follow_ups(&bus, EventType::WorkflowStarted, SystemId::Evolution);
        bus.publish(body_event(
            EventType::HealingStarted,
            SystemId::Evolution,
            Target::Both,
            &HealingStartedBody {
                reason: "error rate above 5%".into(),
                component: Some("ingest".into()),
                context: json!({"errorRate": 0.07}),
            },
        ))
        .unwrap();

        let event: Arc<EventEnvelope> = take(&mut started, 1).await.remove(0);
        let body: WorkflowStartedBody = event.payload.parse().unwrap();
        assert_eq!(body.workflow_id, "heal-1");
        assert_eq!(body.execution_id, "x-77");
        assert_eq!(body.trigger, EventType::HealingStarted.as_str());

        assert_eq!(
            *received.lock(),
            vec![(
                "heal-1".to_string(),
                json!({"input": {"errorRate": 0.07}})
            )]
        );
        assert_eq!(stats.snapshot().succeeded, 1);

        let health = runtime.health().await;
        assert!(health.adapters[0].calls.is_some());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shared_broker_calls_each_system_once() {
        let broker = MemoryBroker::new();
        let evolution_side = instance(&broker, vec![SystemId::Evolution]).await;
        let workflow_side = instance(&broker, vec![SystemId::Workflow]).await;

        evolution_side
            .runtime
            .bus()
            .publish(
                body_event(
                    EventType::MutationApplied,
                    SystemId::Evolution,
                    SystemId::Workflow,
                    &mutation_applied(),
                )
                .with_correlation_id("chain-9"),
            )
            .unwrap();

        eventually("workflow.updated on the broker", || {
            forwarded(&broker, EventType::WorkflowUpdated) >= 1
        })
        .await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(workflow_side.workflow.calls().len(), 1);
        assert!(evolution_side.workflow.calls().is_empty());
        assert_eq!(forwarded(&broker, EventType::WorkflowUpdated), 1);

        workflow_side
            .runtime
            .bus()
            .publish(body_event(
                EventType::WorkflowCompleted,
                SystemId::Workflow,
                SystemId::Evolution,
                &WorkflowRunFinishedBody {
                    workflow_id: "wf-1".into(),
                    execution_id: "x-9".into(),
                    duration_ms: Some(300),
                    metrics: Map::new(),
                    error: None,
                },
            ))
            .unwrap();

        eventually("performance recorded", || {
            forwarded(&broker, EventType::PerformanceRecorded) >= 1
        })
        .await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(evolution_side.evolution.calls().len(), 1);
        assert!(workflow_side.evolution.calls().is_empty());
        assert_eq!(forwarded(&broker, EventType::PerformanceRecorded), 1);

        evolution_side.runtime.shutdown().await;
        workflow_side.runtime.shutdown().await;
    }
}
