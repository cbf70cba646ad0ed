//! # Health Reporting
//!
//! Periodically probes both external systems, snapshots the bus and the
//! call counters, mirrors everything into the Prometheus gauges and logs a
//! one-line summary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_bus::{BusStats, EventBus};
use bridge_telemetry::metrics::{
    ADAPTER_CALLS, ADAPTER_IN_FLIGHT, ADAPTER_PROBE_LATENCY, ADAPTER_UP, BUS_CONNECTED,
    BUS_DEGRADED_TRANSITIONS, BUS_EVENTS_FORWARDED, BUS_EVENTS_PUBLISHED, BUS_EVENTS_RECEIVED,
    BUS_QUEUED_EVENTS, BUS_SUBSCRIPTIONS, HEALTH_REPORTS, UPTIME_SECONDS,
};
use bridge_types::SystemId;
use serde::Serialize;
use system_adapters::{CallStats, CallStatsSnapshot, ConnectionStatus, EvolutionApi, WorkflowApi};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Overall health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Broker connected (or none configured) and both systems reachable.
    Healthy,
    /// Anything else. The bridge keeps working locally.
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterReport {
    pub connection: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calls: Option<CallStatsSnapshot>,
}

/// One health check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub bus: BusStats,
    pub adapters: Vec<AdapterReport>,
    pub uptime_secs: u64,
}

/// Produces [`HealthReport`]s.
pub struct HealthReporter {
    bus: Arc<EventBus>,
    workflow: Arc<dyn WorkflowApi>,
    evolution: Arc<dyn EvolutionApi>,
    call_stats: Vec<(SystemId, Arc<CallStats>)>,
    started_at: Instant,
}

impl HealthReporter {
    pub fn new(
        bus: Arc<EventBus>,
        workflow: Arc<dyn WorkflowApi>,
        evolution: Arc<dyn EvolutionApi>,
        call_stats: Vec<(SystemId, Arc<CallStats>)>,
    ) -> Self {
        Self {
            bus,
            workflow,
            evolution,
            call_stats,
            started_at: Instant::now(),
        }
    }

    /// Probe, snapshot and update the metrics.
    pub async fn check(&self) -> HealthReport {
        let (workflow, evolution) =
            tokio::join!(self.workflow.test_connection(), self.evolution.test_connection());
        let bus = self.bus.stats();

        let adapters: Vec<AdapterReport> = [workflow, evolution]
            .into_iter()
            .map(|connection| AdapterReport {
                calls: self.calls_for(connection.system),
                connection,
            })
            .collect();

        let broker_ok = bus.connected || bus.local_only;
        let status = if broker_ok && adapters.iter().all(|a| a.connection.connected) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        let report = HealthReport {
            status,
            bus,
            adapters,
            uptime_secs: self.started_at.elapsed().as_secs(),
        };
        record_metrics(&report, self.started_at.elapsed());
        report
    }

    fn calls_for(&self, system: SystemId) -> Option<CallStatsSnapshot> {
        self.call_stats
            .iter()
            .find(|(s, _)| *s == system)
            .map(|(_, stats)| stats.snapshot())
    }
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn record_metrics(report: &HealthReport, uptime: Duration) {
    let bus = &report.bus;
    BUS_QUEUED_EVENTS.set(to_i64(bus.queued_events));
    BUS_CONNECTED.set(i64::from(bus.connected));
    BUS_EVENTS_PUBLISHED.set(to_i64(bus.total_published));
    BUS_EVENTS_RECEIVED.set(to_i64(bus.total_received));
    BUS_EVENTS_FORWARDED.set(to_i64(bus.forwarded));
    BUS_DEGRADED_TRANSITIONS.set(to_i64(bus.degraded_transitions));
    BUS_SUBSCRIPTIONS.set(to_i64(bus.subscriptions));

    for adapter in &report.adapters {
        let system = adapter.connection.system.as_str();
        ADAPTER_UP
            .with_label_values(&[system])
            .set(i64::from(adapter.connection.connected));
        ADAPTER_PROBE_LATENCY
            .with_label_values(&[system])
            .set(adapter.connection.latency_ms as f64);

        if let Some(calls) = &adapter.calls {
            ADAPTER_IN_FLIGHT
                .with_label_values(&[system])
                .set(to_i64(calls.in_flight));
            for (outcome, value) in [
                ("succeeded", calls.succeeded),
                ("failed", calls.failed),
                ("timed_out", calls.timed_out),
            ] {
                ADAPTER_CALLS
                    .with_label_values(&[system, outcome])
                    .set(to_i64(value));
            }
        }
    }

    HEALTH_REPORTS
        .with_label_values(&[report.status.as_str()])
        .inc();
    UPTIME_SECONDS.set(uptime.as_secs_f64());
}

/// Run `reporter` every `period` until `shutdown` flips to true.
pub fn spawn_health_reporter(
    reporter: Arc<HealthReporter>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_status = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let report = reporter.check().await;
            if last_status != Some(report.status) {
                match report.status {
                    HealthStatus::Healthy => info!(
                        queued = report.bus.queued_events,
                        connected = report.bus.connected,
                        "Bridge healthy"
                    ),
                    HealthStatus::Degraded => warn!(
                        queued = report.bus.queued_events,
                        connected = report.bus.connected,
                        workflow_up = report.adapters.first().map(|a| a.connection.connected),
                        evolution_up = report.adapters.get(1).map(|a| a.connection.connected),
                        "Bridge degraded"
                    ),
                }
                last_status = Some(report.status);
            } else {
                debug!(status = report.status.as_str(), "Health check");
            }
        }
        debug!("Health reporter stopped");
    })
}
