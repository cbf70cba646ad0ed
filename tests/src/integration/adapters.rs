//! # HTTP Adapters
//!
//! The reqwest clients against in-process axum servers: deadlines, error
//! mapping, probes and call accounting.

#[cfg(test)]
pub(crate) mod server {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Base URL of a port nothing listens on.
    pub async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use bridge_types::SystemId;
    use serde_json::{json, Map};
    use system_adapters::{
        AdapterConfig, AgentConfiguration, CallState, EvolutionApi, EvolutionClient,
        IntegrationCause, WorkflowApi, WorkflowClient,
    };

    use super::server::{closed_port, serve};

    fn config(base_url: String, timeout: Duration) -> AdapterConfig {
        AdapterConfig::new(base_url)
            .with_api_key("test-key")
            .with_timeout(timeout)
    }

    #[tokio::test]
    async fn test_slow_workflow_system_times_out() {
        let url = serve(Router::new().route(
            "/api/v1/workflows/:id/execute",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        ))
        .await;
        let client = WorkflowClient::new(&config(url, Duration::from_millis(150))).unwrap();

        let started = std::time::Instant::now();
        let err = client
            .execute_workflow("wf-1", &json!({"k": 1}))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.is_timeout());
        assert_eq!(err.system, SystemId::Workflow);
        assert_eq!(err.operation, "execute_workflow");

        let stats = client.call_stats().snapshot();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.last_state, CallState::Failed);
    }

    #[tokio::test]
    async fn test_error_statuses_map_to_integration_error() {
        let url = serve(
            Router::new()
                .route(
                    "/api/agents/:id/config",
                    put(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad parameters") }),
                )
                .route(
                    "/api/mutations/:id",
                    get(|| async { (StatusCode::OK, "{\"unexpected\": true}") }),
                ),
        )
        .await;
        let client = EvolutionClient::new(&config(url, Duration::from_secs(2))).unwrap();

        let err = client
            .configure_agent(
                "agent-1",
                &AgentConfiguration {
                    parameters: Map::new(),
                    reason: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.system, SystemId::Evolution);
        assert!(matches!(
            err.cause,
            IntegrationCause::Status { ref body, .. } if body.contains("bad parameters")
        ));

        let err = client.get_mutation_status("m-1").await.unwrap_err();
        assert!(matches!(err.cause, IntegrationCause::Decode(_)));

        let stats = client.call_stats().snapshot();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.succeeded, 0);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected_before_sending() {
        let client =
            WorkflowClient::new(&config(closed_port().await, Duration::from_secs(1))).unwrap();

        for id in ["", "a/b", "with space", "q?x"] {
            let err = client.get_workflow_status(id).await.unwrap_err();
            assert!(
                matches!(err.cause, IntegrationCause::InvalidInput(_)),
                "id {id:?} gave {err}"
            );
        }
        assert_eq!(client.call_stats().snapshot().failed, 0);
    }

    #[tokio::test]
    async fn test_probes_report_reachability() {
        let url = serve(Router::new().route(
            "/healthz",
            get(|| async { Json(json!({"version": "1.42.0"})) }),
        ))
        .await;
        let up = WorkflowClient::new(&config(url, Duration::from_secs(2))).unwrap();
        let status = up.test_connection().await;
        assert!(status.connected);
        assert_eq!(status.system, SystemId::Workflow);
        assert_eq!(status.version.as_deref(), Some("1.42.0"));

        let down =
            EvolutionClient::new(&config(closed_port().await, Duration::from_secs(1))).unwrap();
        let status = down.test_connection().await;
        assert!(!status.connected);
        assert!(status.error.is_some());

        // Probes are not calls.
        assert_eq!(up.call_stats().snapshot().succeeded, 0);
        assert_eq!(down.call_stats().snapshot().failed, 0);
    }

    #[tokio::test]
    async fn test_list_and_record_round_trip() {
        let url = serve(
            Router::new()
                .route(
                    "/api/v1/workflows",
                    get(|| async {
                        Json(json!({"data": [
                            {"id": "wf-1", "name": "ingest", "active": true},
                            {"id": "wf-2", "name": "heal", "active": false}
                        ]}))
                    }),
                )
                .route("/api/performance", post(|| async { StatusCode::NO_CONTENT })),
        )
        .await;

        let workflow = WorkflowClient::new(&config(url.clone(), Duration::from_secs(2))).unwrap();
        let listed = workflow.list_workflows().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].id, "wf-2");

        let evolution = EvolutionClient::new(&config(url, Duration::from_secs(2))).unwrap();
        let record: system_adapters::PerformanceRecord = serde_json::from_value(json!({
            "workflowId": "wf-1",
            "executionId": "x-1",
            "success": true,
            "recordedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        evolution.record_performance(&record).await.unwrap();
        assert_eq!(evolution.call_stats().snapshot().succeeded, 1);
    }

    #[test]
    fn test_bad_base_url_is_a_config_error() {
        let cfg = AdapterConfig::new("localhost:5678");
        assert!(WorkflowClient::new(&cfg).is_err());
    }
}
