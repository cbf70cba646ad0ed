//! # Cross-System Event Bridge
//!
//! Entry point. Connects the workflow execution engine and the
//! mutation/agent engine through the event bus.
//!
//! ```text
//! workflow system ──HTTP── WorkflowClient ◄── WorkflowReactor ◄──┐
//!                                                                │
//!                                   EventBus ◄──► Redis pub/sub ─┤
//!                                                                │
//! evolution system ─HTTP── EvolutionClient ◄── EvolutionReactor ◄┘
//! ```

use anyhow::{Context, Result};
use bridge_runtime::{BridgeRuntime, RuntimeConfig};
use bridge_telemetry::init_telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("failed to read configuration")?;
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("failed to initialize telemetry")?;

    let runtime = BridgeRuntime::from_config(config).await?;
    runtime.start()?;

    info!("Bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    runtime.shutdown().await;
    Ok(())
}
