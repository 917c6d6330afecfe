//! ---
//! fhm_section: "04-configuration-orchestration"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Pipeline orchestration and streaming lifecycle."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use tracing::info;

use r_fhm_common::config::ModelConfig;
use r_fhm_model::{FeatureVector, IsolationForest, ModelArtifact, ModelError, ModelStore};
use r_fhm_persistence::{PersistenceError, TelemetryLog};
use r_fhm_telemetry::FuelSample;

/// Errors raised while refitting the scoring model.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    /// Fitting or persisting the model failed.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Reading training rows from the telemetry log failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Summary of a completed retrain.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Number of telemetry rows the model was fitted on.
    pub trained_rows: usize,
    /// Where the refreshed artifact was written.
    pub artifact_path: PathBuf,
}

/// Refit the model on every stored telemetry row, persist the artifact,
/// and install the new forest for all future scoring.
///
/// Refuses to train below the configured row floor; the previously
/// installed model (if any) stays in effect on any failure.
pub fn retrain_from_log(
    config: &ModelConfig,
    log: &TelemetryLog,
    store: &ModelStore,
    artifact_path: &Path,
) -> Result<TrainingOutcome, TrainingError> {
    let rows: Vec<FeatureVector> = log.all()?.iter().map(FuelSample::features).collect();
    let forest = IsolationForest::fit(config, &rows)?;
    let trained_rows = forest.trained_rows();
    let artifact = ModelArtifact::new(forest)?;
    artifact.save(artifact_path)?;
    store.install(artifact.forest);

    info!(
        trained_rows,
        path = %artifact_path.display(),
        "model retrained and installed"
    );
    Ok(TrainingOutcome {
        trained_rows,
        artifact_path: artifact_path.to_path_buf(),
    })
}
