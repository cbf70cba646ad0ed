//! Integration scenarios. Shared fixtures live in `support`.

pub mod adapters;
pub mod cross_instance;
pub mod degraded_mode;
pub mod ordering;
pub mod reactive_flow;
pub mod routing;

#[cfg(test)]
pub(crate) mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use bridge_bus::{BusConfig, EventStream};
    use bridge_types::{EventEnvelope, EventPayload, EventType, PartialEvent, SystemId, Target};
    use serde_json::{json, Value};
    use tokio::time::{sleep, timeout, Instant};

    /// Upper bound for anything the tests wait on.
    pub const WAIT: Duration = Duration::from_secs(2);

    /// Fast drain, no background reconnects: tests drive `reconnect` by hand.
    pub fn bus_config() -> BusConfig {
        BusConfig {
            drain_delay: Duration::from_millis(1),
            reconnect_interval: Duration::from_secs(3600),
            shutdown_deadline: Duration::from_secs(1),
            ..BusConfig::default()
        }
    }

    pub fn event(
        event_type: EventType,
        source: SystemId,
        target: impl Into<Target>,
        body: Value,
    ) -> PartialEvent {
        let schema = format!("{}/v1", event_type.as_str());
        PartialEvent::new(event_type, source, target, EventPayload::new(schema, body))
    }

    pub fn numbered(event_type: EventType, source: SystemId, seq: usize) -> PartialEvent {
        event(event_type, source, source, json!({ "seq": seq }))
    }

    /// Receive exactly `count` events or fail.
    pub async fn take(stream: &mut EventStream, count: usize) -> Vec<Arc<EventEnvelope>> {
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let event = timeout(WAIT, stream.recv())
                .await
                .expect("timed out waiting for event")
                .expect("stream closed early");
            events.push(event);
        }
        events
    }

    /// Assert nothing else arrives within a short window.
    pub async fn assert_quiet(stream: &mut EventStream) {
        let extra = timeout(Duration::from_millis(100), stream.recv()).await;
        assert!(extra.is_err(), "unexpected event: {extra:?}");
    }

    /// Poll `check` until it holds.
    pub async fn eventually(what: &str, check: impl Fn() -> bool) {
        let deadline = Instant::now() + WAIT;
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            sleep(Duration::from_millis(5)).await;
        }
    }
}
