//! # Correlation Ordering
//!
//! Events sharing a correlation id arrive in publish order, locally and on a
//! second instance, even when interleaved with other chains and kinds.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bridge_bus::{Audience, EventBus, EventSelector, HandlerError, MemoryBroker};
    use bridge_types::{EventEnvelope, EventType, SystemId, Target};
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::integration::support::{bus_config, event, eventually, take};

    /// Publish three steps of chain `x` interleaved with two of chain `y`.
    fn publish_chains(bus: &EventBus) {
        let steps = [
            ("x", 1, EventType::MutationProposed),
            ("y", 1, EventType::WorkflowStarted),
            ("x", 2, EventType::MutationApplied),
            ("y", 2, EventType::WorkflowCompleted),
            ("x", 3, EventType::HealingCompleted),
        ];
        for (chain, step, event_type) in steps {
            bus.publish(
                event(
                    event_type,
                    SystemId::Evolution,
                    Target::Both,
                    json!({"step": step}),
                )
                .with_correlation_id(chain),
            )
            .unwrap();
        }
    }

    fn steps_of(events: &[Arc<EventEnvelope>], chain: &str) -> Vec<i64> {
        events
            .iter()
            .filter(|e| e.correlation_id.as_deref() == Some(chain))
            .filter_map(|e| e.payload.body["step"].as_i64())
            .collect()
    }

    #[tokio::test]
    async fn test_chain_order_on_local_callback() {
        let bus = EventBus::local(bus_config()).await.unwrap();
        let seen: Arc<Mutex<Vec<Arc<EventEnvelope>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        bus.subscribe_fn(
            "chain-x",
            EventSelector::Any,
            Audience::Broadcast,
            move |event| {
                let sink = Arc::clone(&sink);
                async move {
                    if event.correlation_id.as_deref() == Some("x") {
                        sink.lock().push(event);
                    }
                    Ok::<(), HandlerError>(())
                }
            },
        )
        .unwrap();

        publish_chains(&bus);

        eventually("three steps of chain x", || seen.lock().len() == 3).await;
        assert_eq!(steps_of(&seen.lock(), "x"), vec![1, 2, 3]);

        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_chain_order_on_remote_instance() {
        let broker = MemoryBroker::new();
        let a = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        let b = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();
        let mut on_b = b
            .stream(EventSelector::Any, Audience::System(SystemId::Workflow))
            .unwrap();

        publish_chains(&a);

        let received = take(&mut on_b, 5).await;
        assert_eq!(steps_of(&received, "x"), vec![1, 2, 3]);
        assert_eq!(steps_of(&received, "y"), vec![1, 2]);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_chain_order_survives_outage() {
        let broker = MemoryBroker::unavailable();
        let bus = EventBus::connect(bus_config(), Arc::new(broker.clone()))
            .await
            .unwrap();

        publish_chains(&bus);
        assert_eq!(bus.stats().queued_events, 5);

        broker.set_available(true);
        bus.reconnect().await.unwrap();

        let forwarded: Vec<_> = broker
            .published_envelopes()
            .into_iter()
            .map(Arc::new)
            .collect();
        assert_eq!(steps_of(&forwarded, "x"), vec![1, 2, 3]);
        assert_eq!(steps_of(&forwarded, "y"), vec![1, 2]);

        bus.shutdown().await;
    }
}
