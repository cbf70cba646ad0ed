//! # Bridge Runtime Library
//!
//! Wires the event bus to the workflow and evolution adapters. The binary
//! in `main.rs` is a thin shell around [`BridgeRuntime`].
//!
//! ## Startup Sequence
//!
//! 1. Load and validate [`RuntimeConfig`]
//! 2. Build the bus (Redis-backed or local-only) and both HTTP clients
//! 3. Register the configured reactive handlers on the bus
//! 4. Start the health reporter and, if configured, the admin endpoint
//!
//! ## Shutdown Sequence
//!
//! 1. Stop the health reporter and the admin endpoint
//! 2. Shut the bus down (final flush, release broker connection)
//!
//! Both are idempotent.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod admin;
pub mod container;
pub mod health;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bridge_bus::EventBus;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use admin::{admin_router, spawn_admin_server};
pub use container::{BridgeServices, ConfigError, RuntimeConfig};
pub use health::{spawn_health_reporter, HealthReport, HealthReporter, HealthStatus};

/// Grace period for background tasks to stop before they are aborted.
const TASK_STOP_GRACE: Duration = Duration::from_millis(500);

/// The bridge: bus, adapters, reactors and health reporting.
pub struct BridgeRuntime {
    services: Arc<BridgeServices>,
    health: Arc<HealthReporter>,
    health_interval: Duration,
    admin_addr: Option<SocketAddr>,
    bound_admin_addr: Mutex<Option<SocketAddr>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl BridgeRuntime {
    /// Validate `config` and build every service from it.
    pub async fn from_config(config: RuntimeConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let services = BridgeServices::from_config(&config).await?;
        Ok(Self::new(services, config.health_interval).with_admin_addr(config.admin_addr))
    }

    /// Create a runtime around already built services.
    pub fn new(services: BridgeServices, health_interval: Duration) -> Self {
        let health = Arc::new(HealthReporter::new(
            Arc::clone(&services.bus),
            Arc::clone(&services.workflow),
            Arc::clone(&services.evolution),
            services.call_stats.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            services: Arc::new(services),
            health,
            health_interval,
            admin_addr: None,
            bound_admin_addr: Mutex::new(None),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Serve `/health` and `/metrics` on `addr` once started.
    #[must_use]
    pub fn with_admin_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.admin_addr = addr;
        self
    }

    /// Register the reactors and start background tasks. Calling it again
    /// does nothing.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("===========================================");
        info!("  Cross-System Event Bridge v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.services.register_reactors()?;

        let reporter = spawn_health_reporter(
            Arc::clone(&self.health),
            self.health_interval,
            self.shutdown_tx.subscribe(),
        );
        self.tasks.lock().push(reporter);

        if let Some(addr) = self.admin_addr {
            let (bound, server) =
                spawn_admin_server(addr, Arc::clone(&self.health), self.shutdown_tx.subscribe())?;
            *self.bound_admin_addr.lock() = Some(bound);
            self.tasks.lock().push(server);
        }

        let stats = self.services.bus.stats();
        info!(
            connected = stats.connected,
            local_only = stats.local_only,
            subscriptions = stats.subscriptions,
            "Bridge running"
        );
        Ok(())
    }

    /// Address the admin endpoint is listening on, once started.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        *self.bound_admin_addr.lock()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.services.bus
    }

    pub fn services(&self) -> &Arc<BridgeServices> {
        &self.services
    }

    /// Run one health check now.
    pub async fn health(&self) -> HealthReport {
        self.health.check().await
    }

    /// Stop background tasks and shut the bus down. Idempotent.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Initiating graceful shutdown...");

        self.shutdown_tx.send_replace(true);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for mut task in tasks {
            if tokio::time::timeout(TASK_STOP_GRACE, &mut task).await.is_err() {
                warn!("Background task did not stop in time, aborting");
                task.abort();
            }
        }

        self.services.bus.shutdown().await;
        info!("Shutdown complete");
    }
}
