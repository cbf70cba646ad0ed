//! # Routing
//!
//! Target rules seen from the subscriber side:
//!
//! - `workflow` / `evolution` targets reach only that system's subscribers
//! - `both` reaches both systems and broadcast subscribers
//! - threshold, optimization and healing-start events also reach the
//!   optimization group whatever their target
//! - invalid events reach nobody

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bridge_bus::{Audience, BusError, EventBus, EventSelector, HandlerError};
    use bridge_types::{EventType, PartialEvent, SystemId, Target, ValidationError};
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::integration::support::{assert_quiet, bus_config, event, eventually, take};

    #[tokio::test]
    async fn test_targeted_event_reaches_only_its_system() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let mut workflow = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();
        let mut evolution = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Evolution))
            .unwrap();
        let mut broadcast = bus.stream(EventSelector::Any, Audience::Broadcast).unwrap();

        let sent = bus
            .publish(event(
                EventType::MutationApplied,
                SystemId::Evolution,
                SystemId::Workflow,
                json!({"mutationId": "m-1"}),
            ))
            .unwrap();

        let received = take(&mut workflow, 1).await;
        assert_eq!(received[0].id, sent.id);
        assert_quiet(&mut evolution).await;
        assert_quiet(&mut broadcast).await;

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_both_reaches_every_system_and_broadcast() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let mut workflow = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();
        let mut evolution = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Evolution))
            .unwrap();
        let mut broadcast = bus.stream(EventSelector::Any, Audience::Broadcast).unwrap();

        let sent = bus
            .publish(event(
                EventType::PerformanceRecorded,
                SystemId::Evolution,
                Target::Both,
                json!({"success": true}),
            ))
            .unwrap();

        for stream in [&mut workflow, &mut evolution, &mut broadcast] {
            let received = take(stream, 1).await;
            assert_eq!(received[0].id, sent.id);
            assert_quiet(stream).await;
        }

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_optimization_group_ignores_target() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let mut optimization = bus
            .stream(EventSelector::Any, Audience::Optimization)
            .unwrap();

        let threshold = bus
            .publish(event(
                EventType::ThresholdExceeded,
                SystemId::Workflow,
                SystemId::Workflow,
                json!({"metric": "latency"}),
            ))
            .unwrap();
        bus.publish(event(
            EventType::WorkflowCompleted,
            SystemId::Workflow,
            Target::Both,
            json!({"executionId": "x-1"}),
        ))
        .unwrap();
        let healing = bus
            .publish(event(
                EventType::HealingStarted,
                SystemId::Evolution,
                SystemId::Evolution,
                json!({"reason": "error rate"}),
            ))
            .unwrap();

        let received = take(&mut optimization, 2).await;
        assert_eq!(received[0].id, threshold.id);
        assert_eq!(received[1].id, healing.id);
        assert_quiet(&mut optimization).await;

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_selector_filters_event_kind() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let mut failures = bus
            .stream(
                EventSelector::Only(EventType::WorkflowFailed),
                Audience::System(SystemId::Evolution),
            )
            .unwrap();

        for event_type in [
            EventType::WorkflowStarted,
            EventType::WorkflowFailed,
            EventType::WorkflowCompleted,
        ] {
            bus.publish(event(
                event_type,
                SystemId::Workflow,
                SystemId::Evolution,
                json!({"executionId": "x-2"}),
            ))
            .unwrap();
        }

        let received = take(&mut failures, 1).await;
        assert_eq!(received[0].event_type, EventType::WorkflowFailed);
        assert_quiet(&mut failures).await;

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_events_reach_nobody() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let mut everything = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        let missing = bus.publish(PartialEvent::default()).unwrap_err();
        assert!(matches!(
            missing,
            BusError::Validation(ValidationError::MissingField("type"))
        ));

        let mut broadcast_source = event(
            EventType::WorkflowStarted,
            SystemId::Workflow,
            SystemId::Workflow,
            json!({}),
        );
        broadcast_source.source = Some("both".into());
        assert!(matches!(
            bus.publish(broadcast_source),
            Err(BusError::Validation(ValidationError::BroadcastSource))
        ));

        let mut unknown = event(
            EventType::WorkflowStarted,
            SystemId::Workflow,
            SystemId::Workflow,
            json!({}),
        );
        unknown.event_type = Some("workflow.exploded".into());
        assert!(matches!(
            bus.publish(unknown),
            Err(BusError::Validation(ValidationError::UnknownEventType(_)))
        ));

        let mut null_body = event(
            EventType::WorkflowStarted,
            SystemId::Workflow,
            SystemId::Workflow,
            json!({}),
        );
        if let Some(payload) = null_body.payload.as_mut() {
            payload.body = serde_json::Value::Null;
        }
        assert!(matches!(
            bus.publish(null_body),
            Err(BusError::Validation(ValidationError::MissingField("payload")))
        ));

        assert_quiet(&mut everything).await;
        assert_eq!(bus.stats().total_published, 0);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_affect_others() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe_fn(
            "always-fails",
            EventSelector::Any,
            Audience::System(SystemId::Workflow),
            |_event| async { Err::<(), HandlerError>("boom".into()) },
        )
        .unwrap();
        bus.subscribe_fn(
            "panics",
            EventSelector::Any,
            Audience::System(SystemId::Workflow),
            |event| async move {
                assert!(event.payload.body.is_null(), "subscriber bug");
                Ok::<(), HandlerError>(())
            },
        )
        .unwrap();
        let sink = Arc::clone(&seen);
        bus.subscribe_fn(
            "records",
            EventSelector::Any,
            Audience::System(SystemId::Workflow),
            move |event| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(event.id);
                    Ok::<(), HandlerError>(())
                }
            },
        )
        .unwrap();

        let mut sent = Vec::new();
        for seq in 0..3 {
            let envelope = bus
                .publish(event(
                    EventType::WorkflowStarted,
                    SystemId::Workflow,
                    SystemId::Workflow,
                    json!({"seq": seq}),
                ))
                .unwrap();
            sent.push(envelope.id);
        }

        eventually("healthy subscriber to see every event", || {
            seen.lock().len() == 3
        })
        .await;
        assert_eq!(*seen.lock(), sent);

        bus.shutdown().await;
    }
}
