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
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use r_fhm_common::config::SimulatorConfig;
use r_fhm_common::time::utc_now;
use r_fhm_diagnosis::{diagnose, NORMAL_OPERATION_LABEL, NORMAL_OPERATION_SAFETY};
use r_fhm_metrics::PipelineMetrics;
use r_fhm_model::ModelStore;
use r_fhm_telemetry::{FaultInjector, FuelSample, FuelSimulator};

/// Where a pipeline pass was initiated from, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    /// Background streaming loop tick.
    Stream,
    /// Synchronous API request.
    Request,
    /// Fault drill requested through the API.
    FaultDrill,
}

impl SampleOrigin {
    /// Metric label value for this origin.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleOrigin::Stream => "stream",
            SampleOrigin::Request => "request",
            SampleOrigin::FaultDrill => "fault_drill",
        }
    }
}

/// One simulate-score-diagnose pass over a fresh sample.
///
/// The pipeline owns its random sources behind mutexes so one instance
/// can be shared between the streaming loop and request handlers. The
/// model handle is the only cross-pass shared state; every pass reads
/// whichever model is installed at that moment.
pub struct TelemetryPipeline {
    simulator: Mutex<FuelSimulator>,
    injector: Mutex<FaultInjector>,
    model: Arc<ModelStore>,
    metrics: Option<PipelineMetrics>,
}

impl TelemetryPipeline {
    /// Build a pipeline from explicit parts.
    pub fn new(
        simulator: FuelSimulator,
        injector: FaultInjector,
        model: Arc<ModelStore>,
        metrics: Option<PipelineMetrics>,
    ) -> Self {
        Self {
            simulator: Mutex::new(simulator),
            injector: Mutex::new(injector),
            model,
            metrics,
        }
    }

    /// Build a pipeline with generator and injector seeded from config.
    pub fn from_config(
        config: &SimulatorConfig,
        model: Arc<ModelStore>,
        metrics: Option<PipelineMetrics>,
    ) -> Self {
        let injector = FaultInjector::new(config.seed.wrapping_add(1));
        Self::new(FuelSimulator::new(config.clone()), injector, model, metrics)
    }

    /// Whether a scoring model is currently installed.
    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Draw one synthetic sample without scoring it.
    pub fn raw_sample(&self) -> FuelSample {
        self.simulator.lock().sample()
    }

    /// One full pass: simulate, score, and diagnose when anomalous.
    ///
    /// Without an installed model the sample passes through unscored;
    /// the loop keeps producing in this degraded shape.
    pub fn produce(&self, origin: SampleOrigin) -> FuelSample {
        let started = Instant::now();
        let mut sample = self.raw_sample();
        self.score_into(&mut sample);
        self.finish_pass(origin, started, &sample);
        sample
    }

    /// One pass with a named fault applied before scoring.
    ///
    /// The timestamp is refreshed after injection so the stored record
    /// reflects when the perturbed sample entered the pipeline.
    pub fn produce_with_fault(&self, fault_type: &str) -> FuelSample {
        let started = Instant::now();
        let base = self.raw_sample();
        let mut sample = self.injector.lock().inject(&base, fault_type);
        sample.timestamp = utc_now();
        self.score_into(&mut sample);
        self.finish_pass(SampleOrigin::FaultDrill, started, &sample);
        sample
    }

    fn score_into(&self, sample: &mut FuelSample) {
        match self.model.current() {
            Some(forest) => {
                let result = forest.score(&sample.features());
                sample.anomaly = Some(result.anomaly);
                sample.score = Some(result.score);
                if result.anomaly {
                    let cause = diagnose(sample);
                    sample.probable_cause = Some(cause.label().to_owned());
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_anomaly();
                    }
                }
            }
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_scoring_unavailable();
                }
            }
        }
    }

    fn finish_pass(&self, origin: SampleOrigin, started: Instant, sample: &FuelSample) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_sample(origin.as_str());
            metrics.observe_pass(started.elapsed().as_secs_f64());
        }
        debug!(
            origin = origin.as_str(),
            rpm = sample.rpm,
            anomaly = ?sample.anomaly,
            "pipeline pass complete"
        );
    }
}

/// Attach probable cause and safety guidance to a scored sample.
///
/// Anomalous samples get the diagnosed cause and its safety measures;
/// everything else gets the normal-operation pair. Fields are written
/// unconditionally so repeated calls stay consistent with the score,
/// and the chosen pair is returned for callers that echo it back.
pub fn annotate_safety(sample: &mut FuelSample) -> (&'static str, &'static str) {
    let (cause, safety) = if sample.is_anomalous() {
        let cause = diagnose(sample);
        (cause.label(), cause.safety_measures())
    } else {
        (NORMAL_OPERATION_LABEL, NORMAL_OPERATION_SAFETY)
    };
    sample.probable_cause = Some(cause.to_owned());
    sample.safety_measures = Some(safety.to_owned());
    (cause, safety)
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_fhm_common::config::ModelConfig;
    use r_fhm_model::IsolationForest;

    fn trained_store() -> Arc<ModelStore> {
        let mut simulator = FuelSimulator::new(SimulatorConfig {
            temp_excursion_probability: 0.0,
            ..SimulatorConfig::default()
        });
        let rows: Vec<_> = (0..300).map(|_| simulator.sample().features()).collect();
        let forest = IsolationForest::fit(&ModelConfig::default(), &rows).unwrap();
        Arc::new(ModelStore::with_model(forest))
    }

    fn pipeline_with(model: Arc<ModelStore>) -> TelemetryPipeline {
        TelemetryPipeline::from_config(&SimulatorConfig::default(), model, None)
    }

    #[test]
    fn degraded_pass_leaves_scoring_fields_unset() {
        let pipeline = pipeline_with(Arc::new(ModelStore::empty()));
        let sample = pipeline.produce(SampleOrigin::Stream);
        assert!(sample.anomaly.is_none());
        assert!(sample.score.is_none());
        assert!(sample.probable_cause.is_none());
    }

    #[test]
    fn scored_pass_sets_decision_and_score() {
        let pipeline = pipeline_with(trained_store());
        let sample = pipeline.produce(SampleOrigin::Request);
        assert!(sample.anomaly.is_some());
        assert!(sample.score.is_some());
    }

    #[test]
    fn sensor_failure_drill_is_flagged_and_diagnosed() {
        let pipeline = pipeline_with(trained_store());
        let sample = pipeline.produce_with_fault("sensor_failure");
        assert_eq!(sample.fuel_temp, 999.0);
        assert_eq!(sample.anomaly, Some(true));
        assert_eq!(
            sample.probable_cause.as_deref(),
            Some("Overheating sensor or coolant failure")
        );
    }

    #[test]
    fn fault_drill_timestamp_is_refreshed_after_injection() {
        let pipeline = pipeline_with(Arc::new(ModelStore::empty()));
        let before = utc_now();
        let sample = pipeline.produce_with_fault("fuel_leak");
        assert!(sample.timestamp >= before);
        assert_eq!(sample.fault_type.as_deref(), Some("fuel_leak"));
    }

    #[test]
    fn unknown_fault_passes_through_with_note() {
        let pipeline = pipeline_with(Arc::new(ModelStore::empty()));
        let sample = pipeline.produce_with_fault("warp_core_breach");
        assert_eq!(sample.fault_type.as_deref(), Some("warp_core_breach"));
        assert!(sample.note.is_some());
    }

    #[test]
    fn safety_annotation_covers_both_branches() {
        let pipeline = pipeline_with(trained_store());

        let mut anomalous = pipeline.produce_with_fault("sensor_failure");
        annotate_safety(&mut anomalous);
        assert_eq!(
            anomalous.probable_cause.as_deref(),
            Some("Overheating sensor or coolant failure")
        );
        assert!(anomalous
            .safety_measures
            .as_deref()
            .unwrap()
            .contains("temperature"));

        let mut normal = FuelSample::raw(2500, 40.0, 5.0, 33.0, 4.5);
        normal.anomaly = Some(false);
        normal.score = Some(0.05);
        annotate_safety(&mut normal);
        assert_eq!(normal.probable_cause.as_deref(), Some(NORMAL_OPERATION_LABEL));
        assert_eq!(normal.safety_measures.as_deref(), Some(NORMAL_OPERATION_SAFETY));
    }
}
