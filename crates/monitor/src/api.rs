//! HTTP API for health checks, Prometheus metrics and the live timeline

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use monitor_lib::serialization::intervals_to_json;
use monitor_lib::Monitor;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>, run_id: impl Into<String>) -> Self {
        Self {
            monitor,
            run_id: run_id.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    run_id: String,
    uptime_secs: i64,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        run_id: state.run_id.clone(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Everything recorded so far, in the interval artifact format
async fn intervals(State(state): State<Arc<AppState>>) -> Response {
    let intervals = state.monitor.event_intervals(None, None);
    match intervals_to_json(&intervals) {
        Ok(body) => (StatusCode::OK, [("content-type", "application/json")], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode intervals");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/intervals", get(intervals))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use monitor_lib::{Condition, MonitorMetrics};
    use tower::ServiceExt;

    fn setup_test_app() -> (Router, Arc<AppState>) {
        MonitorMetrics::new();
        let state = Arc::new(AppState::new(Arc::new(Monitor::new()), "run-1"));
        (create_router(state.clone()), state)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_healthz_returns_run_id() {
        let (app, _state) = setup_test_app();

        let (status, body) = get_body(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["run_id"], "run-1");
    }

    #[tokio::test]
    async fn test_metrics_exposes_monitor_counters() {
        let (app, state) = setup_test_app();
        state
            .monitor
            .record(vec![Condition::info("ns/e2e pod/a uid/1", "reason/Created ")]);

        let (status, body) = get_body(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("cluster_monitor_events_recorded_total"));
    }

    #[tokio::test]
    async fn test_intervals_returns_recorded_events() {
        let (app, state) = setup_test_app();
        state.monitor.record(vec![Condition::warning(
            "backend-disruption-name/kube-api connection/new",
            "reason/DisruptionSamplerOutageBegan dns",
        )]);

        let (status, body) = get_body(app, "/intervals").await;

        assert_eq!(status, StatusCode::OK);
        let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let items = document["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["level"], "Warning");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _state) = setup_test_app();
        let (status, _) = get_body(app, "/readyz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
