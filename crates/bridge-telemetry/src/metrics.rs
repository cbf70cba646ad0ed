//! Prometheus metrics for the event bridge.
//!
//! All metrics follow the naming convention: `bridge_<component>_<metric>`.
//! Bus and adapter values are mirrored from their stats snapshots by the
//! runtime's health reporter, so they are gauges even where the underlying
//! value only grows.

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Metrics registry of the bridge
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Events waiting in the resilience queue
    pub static ref BUS_QUEUED_EVENTS: IntGauge = IntGauge::new(
        "bridge_bus_queued_events",
        "Events buffered while the broker is unreachable"
    ).expect("metric creation failed");

    /// 1 while the broker link is up
    pub static ref BUS_CONNECTED: IntGauge = IntGauge::new(
        "bridge_bus_connected",
        "Whether the transport is connected to the broker"
    ).expect("metric creation failed");

    pub static ref BUS_EVENTS_PUBLISHED: IntGauge = IntGauge::new(
        "bridge_bus_events_published",
        "Events accepted by publish since start"
    ).expect("metric creation failed");

    pub static ref BUS_EVENTS_RECEIVED: IntGauge = IntGauge::new(
        "bridge_bus_events_received",
        "Events received from other bridge instances since start"
    ).expect("metric creation failed");

    pub static ref BUS_EVENTS_FORWARDED: IntGauge = IntGauge::new(
        "bridge_bus_events_forwarded",
        "Events forwarded to the broker since start"
    ).expect("metric creation failed");

    pub static ref BUS_DEGRADED_TRANSITIONS: IntGauge = IntGauge::new(
        "bridge_bus_degraded_transitions",
        "Connected to degraded transitions since start"
    ).expect("metric creation failed");

    pub static ref BUS_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "bridge_bus_subscriptions",
        "Live subscriptions"
    ).expect("metric creation failed");

    // =========================================================================
    // ADAPTER METRICS
    // =========================================================================

    /// Finished adapter calls
    pub static ref ADAPTER_CALLS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bridge_adapter_calls", "Finished adapter calls by outcome"),
        &["system", "outcome"]  // outcome: succeeded/failed/timed_out
    ).expect("metric creation failed");

    pub static ref ADAPTER_IN_FLIGHT: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bridge_adapter_calls_in_flight", "Adapter calls currently running"),
        &["system"]
    ).expect("metric creation failed");

    /// Result of the last connectivity probe
    pub static ref ADAPTER_UP: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bridge_adapter_up", "Whether the last connectivity probe succeeded"),
        &["system"]
    ).expect("metric creation failed");

    pub static ref ADAPTER_PROBE_LATENCY: GaugeVec = GaugeVec::new(
        Opts::new("bridge_adapter_probe_latency_ms", "Latency of the last connectivity probe"),
        &["system"]
    ).expect("metric creation failed");

    // =========================================================================
    // RUNTIME METRICS
    // =========================================================================

    /// Health reports produced
    pub static ref HEALTH_REPORTS: IntCounterVec = IntCounterVec::new(
        Opts::new("bridge_health_reports_total", "Health reports by overall status"),
        &["status"]  // status: healthy/degraded
    ).expect("metric creation failed");

    /// Seconds since the runtime started
    pub static ref UPTIME_SECONDS: Gauge = Gauge::new(
        "bridge_uptime_seconds",
        "Seconds since the bridge runtime started"
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Registering twice is a no-op.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bus
        Box::new(BUS_QUEUED_EVENTS.clone()),
        Box::new(BUS_CONNECTED.clone()),
        Box::new(BUS_EVENTS_PUBLISHED.clone()),
        Box::new(BUS_EVENTS_RECEIVED.clone()),
        Box::new(BUS_EVENTS_FORWARDED.clone()),
        Box::new(BUS_DEGRADED_TRANSITIONS.clone()),
        Box::new(BUS_SUBSCRIPTIONS.clone()),
        // Adapters
        Box::new(ADAPTER_CALLS.clone()),
        Box::new(ADAPTER_IN_FLIGHT.clone()),
        Box::new(ADAPTER_UP.clone()),
        Box::new(ADAPTER_PROBE_LATENCY.clone()),
        // Runtime
        Box::new(HEALTH_REPORTS.clone()),
        Box::new(UPTIME_SECONDS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
