//! ---
//! fhm_section: "15-testing-qa-runbook"
//! fhm_subsection: "integration-tests"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Integration and validation tests for the R-FHM stack."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_fhm_api::{spawn_api_server, ApiState};
use r_fhm_common::config::AppConfig;
use r_fhm_common::VersionInfo;
use r_fhm_core::{AlertDispatcher, StreamRunner, TelemetryPipeline};
use r_fhm_metrics::{new_registry, spawn_http_server, PipelineMetrics};
use r_fhm_model::ModelStore;
use r_fhm_persistence::{TankRegistry, TelemetryLog};
use r_fhm_transport::InMemoryTransport;
use reqwest::Client;
use serde_json::Value;
use tempfile::tempdir;
use tokio::time::sleep;

#[allow(clippy::field_reassign_with_default)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn monitor_stack_streams_retrains_and_serves() {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.directory = dir.path().to_path_buf();
    config.model.artifact_path = dir.path().join("anomaly_model.json");
    config.stream.tick_interval = Duration::from_millis(40);

    let registry = new_registry();
    let metrics = PipelineMetrics::new(registry.clone()).unwrap();

    let log = Arc::new(TelemetryLog::open(&config.storage.telemetry_path()).unwrap());
    let tanks = Arc::new(TankRegistry::open(&config.storage.tank_path()).unwrap());
    let store = Arc::new(ModelStore::empty());
    let pipeline = Arc::new(TelemetryPipeline::from_config(
        &config.simulator,
        Arc::clone(&store),
        Some(metrics.clone()),
    ));
    let dispatcher = Arc::new(AlertDispatcher::from_config(&config.alerts).unwrap());

    // Seed enough history for the first retrain before the loop starts.
    for _ in 0..24 {
        log.append(&pipeline.raw_sample()).unwrap();
    }

    let bus = InMemoryTransport::new(64);
    let stream = StreamRunner::new(
        Arc::clone(&pipeline),
        Arc::clone(&log),
        Arc::new(bus.clone()),
        config.transport.topic.clone(),
        config.stream.tick_interval,
        Some(metrics.clone()),
    )
    .spawn();

    let metrics_server =
        spawn_http_server(registry.clone(), "127.0.0.1:0".parse().unwrap()).unwrap();
    let state = Arc::new(ApiState::new(
        Arc::clone(&pipeline),
        Arc::clone(&store),
        Arc::clone(&log),
        Arc::clone(&tanks),
        Arc::clone(&dispatcher),
        config.model.clone(),
        Some(metrics.clone()),
        config.mode,
        VersionInfo::current(),
    ));
    let api = spawn_api_server(state, "127.0.0.1:0".parse().unwrap()).unwrap();
    let base = format!("http://{}", api.addr());
    let client = Client::new();

    sleep(Duration::from_millis(130)).await;
    let streamed = log.len().unwrap();
    assert!(
        streamed >= 26,
        "stream loop should extend the seeded log, got {streamed} records"
    );
    let published = bus.recv().expect("stream loop should publish reduced samples");
    assert_eq!(published.topic, "helicopter/fuel");

    // Degraded until a model is trained.
    let status: Value = client
        .get(format!("{base}/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["model_loaded"], false);

    let retrained: Value = client
        .post(format!("{base}/api/retrain"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(retrained["message"], "Model retrained and saved.");
    assert!(config.model.artifact_path.exists());
    assert!(store.is_loaded());

    // The running loop must pick up the swapped model without a restart.
    sleep(Duration::from_millis(130)).await;
    let newest = log.recent(1).unwrap();
    assert!(
        newest[0].score.is_some(),
        "stream passes should be scored once a model is installed"
    );

    let predicted: Value = client
        .post(format!("{base}/api/predict"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(predicted["score"].is_number());
    assert!(predicted["telemetry"]["rpm"].is_u64());

    let scrape = client
        .get(format!("http://{}/metrics", metrics_server.addr()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(scrape.contains("r_fhm_samples_total"));
    assert!(scrape.contains("r_fhm_model_swaps_total"));

    stream.shutdown().await.unwrap();
    api.shutdown().await.unwrap();
    metrics_server.shutdown().await.unwrap();
}

#[allow(clippy::field_reassign_with_default)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounded_bus_never_stalls_the_log() {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.directory = dir.path().to_path_buf();

    let log = Arc::new(TelemetryLog::open(&config.storage.telemetry_path()).unwrap());
    let store = Arc::new(ModelStore::empty());
    let pipeline = Arc::new(TelemetryPipeline::from_config(
        &config.simulator,
        Arc::clone(&store),
        None,
    ));

    let bus = InMemoryTransport::new(2);
    let stream = StreamRunner::new(
        Arc::clone(&pipeline),
        Arc::clone(&log),
        Arc::new(bus.clone()),
        config.transport.topic.clone(),
        Duration::from_millis(20),
        None,
    )
    .spawn();

    sleep(Duration::from_millis(150)).await;
    stream.shutdown().await.unwrap();

    let stored = log.len().unwrap();
    assert!(
        stored >= 5,
        "storage must keep every pass even when the bus is saturated, got {stored}"
    );
    assert!(bus.len() <= 2, "bus must hold at most its configured capacity");
}
