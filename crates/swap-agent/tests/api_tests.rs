//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use swap_agent::api::{create_router, AppState};
use swap_lib::{
    health::{components, HealthRegistry},
    metrics::{FamilyRegistry, LABEL_DEVICE, LABEL_STATE, STATE_USED},
    sink::{MetricSink, PrometheusSink},
    AgentMetrics, MetricValue,
};
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::EXPORTER).await;

    let state = Arc::new(AppState::new(health_registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
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
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["collector"].is_object());
    assert!(health["components"]["exporter"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_collector_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::COLLECTOR, "failed to read /proc/swaps")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["collector"]["message"],
        "failed to read /proc/swaps"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::EXPORTER, "sink closed")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_initialization() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_exposes_swap_families_and_self_metrics() {
    let (app, _state) = setup_test_app().await;

    let metrics = AgentMetrics::new();
    metrics.observe_collection_latency(0.002);
    metrics.inc_cycles();

    let mut sink = PrometheusSink::register_default().unwrap();
    let mut families = FamilyRegistry::new();
    families.usage.append(
        &[(LABEL_DEVICE, "/dev/sda2")],
        LABEL_STATE,
        STATE_USED,
        MetricValue::Gauge(524288000.0),
    );
    families.dispatch(&mut sink);
    sink.end_cycle();

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains(
        "system_paging_usage{system_device=\"/dev/sda2\",system_paging_state=\"used\"} 524288000"
    ));
    assert!(text.contains("swap_agent_collection_latency_seconds_bucket"));
    assert!(text.contains("swap_agent_cycles_total"));
}
