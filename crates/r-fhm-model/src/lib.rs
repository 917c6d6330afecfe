//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Outlier detection model for fuel-system telemetry."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Isolation-forest anomaly model for fuel-system telemetry.
//!
//! The model is fitted offline on the four raw sensor features of a
//! sample, stored as a digest-checked JSON artifact, and served to the
//! pipeline through an atomically swappable handle so retraining never
//! disturbs in-flight scoring.

pub mod artifact;
pub mod errors;
pub mod forest;
pub mod store;
pub mod tree;

pub use artifact::ModelArtifact;
pub use errors::{ModelError, Result};
pub use forest::{IsolationForest, ScoreResult};
pub use store::ModelStore;

/// Width of the feature vector the model is fitted on: rpm, fuel
/// pressure, fuel temperature, and flow rate. Throttle is omitted as it
/// is fully determined by rpm.
pub const FEATURE_COUNT: usize = 4;

/// One observation in model feature space.
pub type FeatureVector = [f64; FEATURE_COUNT];
