//! ---
//! fhm_section: "11-simulation-telemetry"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Synthetic telemetry generation and fault drills."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Fuel-system telemetry primitives for the R-FHM workspace.
//! This crate owns the sample record exchanged across the pipeline, the
//! synthetic sample generator, and the deterministic fault injector used
//! for diagnosis drills.

pub mod faults;
pub mod sample;
pub mod simulator;

pub use faults::{FaultInjector, FaultKind};
pub use sample::{round2, round4, FuelSample};
pub use simulator::FuelSimulator;
