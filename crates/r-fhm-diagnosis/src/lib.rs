//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Cause inference and degradation estimation."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Deterministic diagnosis for anomalous fuel-system samples.
//!
//! A first-match rule cascade maps an anomalous sample to one canonical
//! [`Cause`]; the same enumeration keys the safety and maintenance
//! mappings so every produced cause has a specific recommendation.
//! The degradation estimator projects remaining useful life from the
//! spacing of historical anomaly timestamps.

pub mod cause;
pub mod maintenance;
pub mod rules;
pub mod rul;

pub use cause::{Cause, NORMAL_OPERATION_LABEL, NORMAL_OPERATION_SAFETY};
pub use maintenance::{aggregate_maintenance, MaintenanceSuggestion, DEFAULT_WINDOW};
pub use rul::{estimate_rul, RulEstimate};
pub use rules::diagnose;
