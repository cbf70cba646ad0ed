//! # Admin Endpoint
//!
//! Optional operator listener, enabled by `BRIDGE_ADMIN_ADDR`:
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /health` | current [`HealthReport`] as JSON, 503 while degraded |
//! | `GET /metrics` | Prometheus text exposition |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bridge_telemetry::gather_metrics;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::health::{HealthReporter, HealthStatus};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Routes served by the admin listener.
pub fn admin_router(health: Arc<HealthReporter>) -> Router {
    Router::new()
        .route(
            "/health",
            get(move || {
                let health = Arc::clone(&health);
                async move {
                    let report = health.check().await;
                    let status = match report.status {
                        HealthStatus::Healthy => StatusCode::OK,
                        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
                    };
                    (status, Json(report))
                }
            }),
        )
        .route("/metrics", get(metrics))
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Bind `addr` and serve the admin routes until `shutdown` flips to true.
/// Returns the bound address (useful with port 0) and the server task.
///
/// Binds synchronously so a taken port fails startup. Must be called from
/// within a Tokio runtime.
pub fn spawn_admin_server(
    addr: SocketAddr,
    health: Arc<HealthReporter>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("failed to bind admin listener on {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure admin listener")?;
    let listener = TcpListener::from_std(listener).context("failed to register admin listener")?;
    let bound = listener
        .local_addr()
        .context("failed to read admin listener address")?;
    info!(addr = %bound, "Admin endpoint listening");

    let task = tokio::spawn(async move {
        let stop = async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    return;
                }
            }
        };
        if let Err(e) = axum::serve(listener, admin_router(health))
            .with_graceful_shutdown(stop)
            .await
        {
            warn!(error = %e, "Admin endpoint failed");
        }
        debug!("Admin endpoint stopped");
    });
    Ok((bound, task))
}
