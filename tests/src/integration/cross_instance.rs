//! # Cross-Instance Delivery
//!
//! Two bus instances sharing one broker, as two bridge processes would.
//! Each instance delivers its own events locally once and never again when
//! the broker echoes them back.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bridge_bus::{Audience, EventBus, EventSelector, MemoryBroker};
    use bridge_types::{EventType, SystemId, Target};
    use serde_json::json;

    use crate::integration::support::{assert_quiet, bus_config, event, eventually, numbered, take};

    async fn pair(broker: &MemoryBroker) -> (EventBus, EventBus) {
        let a = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        let b = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_event_reaches_other_instance_once() {
        let broker = MemoryBroker::new();
        let (a, b) = pair(&broker).await;
        let mut on_a = a
            .stream(EventSelector::Any, Audience::System(SystemId::Evolution))
            .unwrap();
        let mut on_b = b
            .stream(EventSelector::Any, Audience::System(SystemId::Evolution))
            .unwrap();

        let sent = a
            .publish(event(
                EventType::WorkflowFailed,
                SystemId::Workflow,
                SystemId::Evolution,
                json!({"executionId": "x-9", "error": "node crashed"}),
            ))
            .unwrap();

        let local = take(&mut on_a, 1).await;
        let remote = take(&mut on_b, 1).await;
        assert_eq!(local[0].id, sent.id);
        assert_eq!(remote[0].id, sent.id);
        assert_eq!(remote[0].payload, sent.payload);
        assert_eq!(remote[0].target, sent.target);

        // No echo on the publishing side.
        assert_quiet(&mut on_a).await;
        assert_quiet(&mut on_b).await;
        assert_eq!(a.stats().total_received, 0);
        assert_eq!(b.stats().total_received, 1);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_events_keep_publish_order() {
        let broker = MemoryBroker::new();
        let (a, b) = pair(&broker).await;
        let mut on_b = b
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        let mut sent = Vec::new();
        for seq in 0..10 {
            sent.push(
                a.publish(numbered(EventType::WorkflowStarted, SystemId::Workflow, seq))
                    .unwrap()
                    .id,
            );
        }

        let received: Vec<_> = take(&mut on_b, 10).await.iter().map(|e| e.id).collect();
        assert_eq!(received, sent);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_routing_honors_target() {
        let broker = MemoryBroker::new();
        let (a, b) = pair(&broker).await;
        let mut workflow_on_b = b
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();
        let mut broadcast_on_b = b.stream(EventSelector::Any, Audience::Broadcast).unwrap();

        a.publish(event(
            EventType::MutationApplied,
            SystemId::Evolution,
            SystemId::Evolution,
            json!({"mutationId": "m-3"}),
        ))
        .unwrap();
        let both = a
            .publish(event(
                EventType::PerformanceRecorded,
                SystemId::Evolution,
                Target::Both,
                json!({"success": false}),
            ))
            .unwrap();

        assert_eq!(take(&mut workflow_on_b, 1).await[0].id, both.id);
        assert_eq!(take(&mut broadcast_on_b, 1).await[0].id, both.id);
        assert_quiet(&mut workflow_on_b).await;
        eventually("both events to arrive on b", || b.stats().total_received == 2).await;

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_on_channel_is_dropped() {
        let broker = MemoryBroker::new();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        let mut stream = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        let channel = bus_config().channel_for(SystemId::Workflow);
        assert_eq!(broker.inject(&channel, b"not json".to_vec()), 1);

        assert_quiet(&mut stream).await;
        assert_eq!(bus.stats().total_received, 0);
        assert!(bus.stats().connected);

        bus.shutdown().await;
    }
}
