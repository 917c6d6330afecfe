//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Outlier detection model for fuel-system telemetry."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("not enough data to train model: have {have} rows, need at least {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("model artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("model artifact serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("model artifact digest mismatch: stored {stored}, computed {computed}")]
    DigestMismatch { stored: String, computed: String },
}
