//! ---
//! fhm_section: "04-configuration-orchestration"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Pipeline orchestration and streaming lifecycle."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use r_fhm_metrics::PipelineMetrics;
use r_fhm_persistence::TelemetryLog;
use r_fhm_transport::{ReducedSample, Transport};

use crate::pipeline::{SampleOrigin, TelemetryPipeline};

/// Background producer that runs one pipeline pass per tick and hands
/// the result to the transport and storage sinks.
///
/// Sink failures degrade that one sample and are logged; the loop never
/// stops on them. Samples leave the loop in strict production order.
pub struct StreamRunner {
    pipeline: Arc<TelemetryPipeline>,
    log: Arc<TelemetryLog>,
    transport: Arc<dyn Transport>,
    topic: String,
    tick_interval: Duration,
    metrics: Option<PipelineMetrics>,
}

impl StreamRunner {
    pub fn new(
        pipeline: Arc<TelemetryPipeline>,
        log: Arc<TelemetryLog>,
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        tick_interval: Duration,
        metrics: Option<PipelineMetrics>,
    ) -> Self {
        Self {
            pipeline,
            log,
            transport,
            topic: topic.into(),
            tick_interval,
            metrics,
        }
    }

    /// Start the loop on the runtime and return its lifecycle handle.
    ///
    /// The first pass runs immediately; subsequent passes follow every
    /// `tick_interval`.
    pub fn spawn(self) -> StreamHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(4);
        info!(
            interval_secs = self.tick_interval.as_secs_f64(),
            topic = %self.topic,
            transport = self.transport.name(),
            "streaming loop starting"
        );
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("streaming loop shutdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_pass();
                    }
                }
            }
        });

        StreamHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    fn run_pass(&self) {
        let sample = self.pipeline.produce(SampleOrigin::Stream);

        if let Err(err) = self.transport.publish(&self.topic, ReducedSample::from(&sample)) {
            warn!(
                error = %err,
                transport = self.transport.name(),
                "failed to publish reduced sample"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_sink_failure("transport");
            }
        }

        if let Err(err) = self.log.append(&sample) {
            warn!(error = %err, "failed to append sample to telemetry log");
            if let Some(metrics) = &self.metrics {
                metrics.inc_sink_failure("storage");
            }
        }
    }
}

/// Handle used to stop the streaming loop deterministically.
pub struct StreamHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Signal shutdown and wait for the in-flight pass to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.context("streaming task join error")?;
        info!("streaming loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_fhm_common::config::SimulatorConfig;
    use r_fhm_model::ModelStore;
    use r_fhm_transport::InMemoryTransport;
    use tempfile::tempdir;

    fn test_pipeline() -> Arc<TelemetryPipeline> {
        Arc::new(TelemetryPipeline::from_config(
            &SimulatorConfig::default(),
            Arc::new(ModelStore::empty()),
            None,
        ))
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn publish(&self, _topic: &str, _payload: ReducedSample) -> r_fhm_transport::Result<()> {
            Err(r_fhm_transport::TransportError::Unavailable("test"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publishes_and_stores_on_each_tick() {
        let dir = tempdir().unwrap();
        let log = Arc::new(TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap());
        let transport = InMemoryTransport::new(64);

        let handle = StreamRunner::new(
            test_pipeline(),
            log.clone(),
            Arc::new(transport.clone()),
            "helicopter/fuel",
            Duration::from_millis(20),
            None,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(110)).await;
        handle.shutdown().await.unwrap();

        let stored = log.all().unwrap();
        assert!(stored.len() >= 3, "expected several ticks, got {}", stored.len());
        assert!(transport.len() >= 3);

        let published = transport.recv().unwrap();
        assert_eq!(published.topic, "helicopter/fuel");
        assert_eq!(published.payload.rpm, stored[0].rpm);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn transport_failures_do_not_stop_storage() {
        let dir = tempdir().unwrap();
        let log = Arc::new(TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap());

        let handle = StreamRunner::new(
            test_pipeline(),
            log.clone(),
            Arc::new(FailingTransport),
            "helicopter/fuel",
            Duration::from_millis(20),
            None,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(110)).await;
        handle.shutdown().await.unwrap();

        assert!(log.all().unwrap().len() >= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_stops_production() {
        let dir = tempdir().unwrap();
        let log = Arc::new(TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap());

        let handle = StreamRunner::new(
            test_pipeline(),
            log.clone(),
            Arc::new(InMemoryTransport::new(16)),
            "helicopter/fuel",
            Duration::from_millis(20),
            None,
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown().await.unwrap();
        let settled = log.all().unwrap().len();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(log.all().unwrap().len(), settled);
    }
}
