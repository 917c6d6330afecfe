//! ---
//! fhm_section: "03-persistence-logging"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Metrics collection and export utilities."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{
    response::{IntoResponse, Response},
    Router,
};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, TEXT_FORMAT,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let local_addr = std_listener
        .local_addr()
        .with_context(|| "failed to resolve metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %local_addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

/// Prometheus scrape endpoint. Returns `text/plain` metrics even on large registries.
async fn metrics_handler(registry: SharedRegistry) -> Response {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT))],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Return the bound address for convenience.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "r_fhmd_starts_total",
            "Total number of times the R-FHM daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "r_fhmd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new(
                "r_fhmd_build_info",
                "Build metadata for the running daemon binary",
            ),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

/// Metrics recorded by the scoring pipeline and streaming loop.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: SharedRegistry,
    samples_total: IntCounterVec,
    anomalies_total: IntCounter,
    scoring_unavailable_total: IntCounter,
    sink_failures_total: IntCounterVec,
    pass_duration_seconds: Histogram,
    model_swaps_total: IntCounter,
    model_loaded: IntGauge,
}

impl PipelineMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let samples_total = IntCounterVec::new(
            Opts::new(
                "r_fhm_samples_total",
                "Count of telemetry samples produced, by origin",
            ),
            &["origin"],
        )?;
        registry.register(Box::new(samples_total.clone()))?;

        let anomalies_total = IntCounter::with_opts(Opts::new(
            "r_fhm_anomalies_total",
            "Count of samples the scorer flagged anomalous",
        ))?;
        registry.register(Box::new(anomalies_total.clone()))?;

        let scoring_unavailable_total = IntCounter::with_opts(Opts::new(
            "r_fhm_scoring_unavailable_total",
            "Count of pipeline passes that ran without a loaded model",
        ))?;
        registry.register(Box::new(scoring_unavailable_total.clone()))?;

        let sink_failures_total = IntCounterVec::new(
            Opts::new(
                "r_fhm_sink_failures_total",
                "Count of sink hand-off failures, by sink",
            ),
            &["sink"],
        )?;
        registry.register(Box::new(sink_failures_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.0001, 2.0, 14)
            .context("failed to construct histogram buckets")?;
        let pass_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "r_fhm_pass_duration_seconds",
                "Wall-clock duration of one simulate-score-diagnose pass",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(pass_duration_seconds.clone()))?;

        let model_swaps_total = IntCounter::with_opts(Opts::new(
            "r_fhm_model_swaps_total",
            "Count of scoring model swaps installed at runtime",
        ))?;
        registry.register(Box::new(model_swaps_total.clone()))?;

        let model_loaded = IntGauge::with_opts(Opts::new(
            "r_fhm_model_loaded",
            "Indicator (0/1) whether a scoring model is currently loaded",
        ))?;
        registry.register(Box::new(model_loaded.clone()))?;

        Ok(Self {
            registry,
            samples_total,
            anomalies_total,
            scoring_unavailable_total,
            sink_failures_total,
            pass_duration_seconds,
            model_swaps_total,
            model_loaded,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_sample(&self, origin: &str) {
        self.samples_total.with_label_values(&[origin]).inc();
    }

    pub fn inc_anomaly(&self) {
        self.anomalies_total.inc();
    }

    pub fn inc_scoring_unavailable(&self) {
        self.scoring_unavailable_total.inc();
    }

    pub fn inc_sink_failure(&self, sink: &str) {
        self.sink_failures_total.with_label_values(&[sink]).inc();
    }

    pub fn observe_pass(&self, seconds: f64) {
        self.pass_duration_seconds.observe(seconds);
    }

    pub fn inc_model_swap(&self) {
        self.model_swaps_total.inc();
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(if loaded { 1 } else { 0 });
    }
}

pub use prometheus;
