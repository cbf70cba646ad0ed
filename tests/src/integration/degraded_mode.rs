//! # Degraded Mode
//!
//! Broker outages as seen by publishers and subscribers:
//!
//! ```text
//! publish ──→ local subscribers        (always, immediately)
//!         └─→ broker  (Connected)
//!         └─→ queue   (Degraded) ──reconnect──→ broker, per-source order
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bridge_bus::{Audience, EventBus, EventSelector, MemoryBroker, TransportState};
    use bridge_types::{EventType, SystemId};

    use crate::integration::support::{assert_quiet, bus_config, eventually, numbered, take};

    #[tokio::test]
    async fn test_outage_queues_then_drains_in_order() {
        let broker = MemoryBroker::unavailable();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        assert!(!bus.stats().connected);
        assert_eq!(bus.stats().state, TransportState::Degraded);

        let mut local = bus
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        let mut sent = Vec::new();
        for seq in 0..5 {
            let envelope = bus
                .publish(numbered(EventType::WorkflowCompleted, SystemId::Workflow, seq))
                .unwrap();
            sent.push(envelope.id);
        }

        // Local delivery does not wait for the broker.
        let received: Vec<_> = take(&mut local, 5).await.iter().map(|e| e.id).collect();
        assert_eq!(received, sent);
        assert_eq!(bus.stats().queued_events, 5);
        assert!(broker.published().is_empty());

        broker.set_available(true);
        assert_eq!(bus.reconnect().await.unwrap(), 5);

        let stats = bus.stats();
        assert!(stats.connected);
        assert_eq!(stats.queued_events, 0);
        assert_eq!(stats.forwarded, 5);
        let forwarded: Vec<_> = broker.published_envelopes().iter().map(|e| e.id).collect();
        assert_eq!(forwarded, sent);

        // Draining is remote-only; local subscribers already had them.
        assert_quiet(&mut local).await;

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_source_order_survives_interleaving() {
        let broker = MemoryBroker::unavailable();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();

        let mut workflow_ids = Vec::new();
        let mut evolution_ids = Vec::new();
        for seq in 0..4 {
            workflow_ids.push(
                bus.publish(numbered(EventType::WorkflowStarted, SystemId::Workflow, seq))
                    .unwrap()
                    .id,
            );
            evolution_ids.push(
                bus.publish(numbered(EventType::MutationProposed, SystemId::Evolution, seq))
                    .unwrap()
                    .id,
            );
        }
        assert_eq!(bus.stats().queued_events, 8);

        broker.set_available(true);
        assert_eq!(bus.reconnect().await.unwrap(), 8);

        let forwarded = broker.published_envelopes();
        let from = |source: SystemId| -> Vec<_> {
            forwarded
                .iter()
                .filter(|e| e.source == source)
                .map(|e| e.id)
                .collect()
        };
        assert_eq!(from(SystemId::Workflow), workflow_ids);
        assert_eq!(from(SystemId::Evolution), evolution_ids);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_connection_loss_switches_to_queueing() {
        let broker = MemoryBroker::new();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        assert!(bus.stats().connected);

        let live = bus
            .publish(numbered(EventType::WorkflowStarted, SystemId::Workflow, 0))
            .unwrap();
        eventually("live event to be forwarded", || {
            broker.published_envelopes().len() == 1
        })
        .await;

        broker.set_available(false);
        eventually("transport to notice the outage", || !bus.stats().connected).await;
        assert!(bus.stats().degraded_transitions >= 1);

        let mut queued = Vec::new();
        for seq in 1..4 {
            queued.push(
                bus.publish(numbered(EventType::WorkflowStarted, SystemId::Workflow, seq))
                    .unwrap()
                    .id,
            );
        }
        assert_eq!(bus.stats().queued_events, 3);

        broker.set_available(true);
        assert_eq!(bus.reconnect().await.unwrap(), 3);

        let forwarded: Vec<_> = broker.published_envelopes().iter().map(|e| e.id).collect();
        let mut expected = vec![live.id];
        expected.extend(queued);
        assert_eq!(forwarded, expected);
        assert_eq!(bus.stats().forwarded, 4);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_queue() {
        let broker = MemoryBroker::unavailable();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();

        bus.publish(numbered(EventType::HealingStarted, SystemId::Evolution, 0))
            .unwrap();
        assert!(bus.reconnect().await.is_err());
        assert_eq!(bus.stats().queued_events, 1);
        assert!(!bus.stats().connected);

        bus.shutdown().await;
    }
}
