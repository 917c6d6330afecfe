//! ---
//! fhm_section: "01-core-functionality"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Shared primitives and utilities for the fuel health monitor runtime."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Core shared primitives for the R-FHM workspace.
//! This crate exposes configuration loading, logging bootstrap, time helpers
//! and version metadata consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    AlertConfig, ApiConfig, AppConfig, LoggingConfig, MetricsConfig, Mode, ModelConfig,
    SimulatorConfig, StorageConfig, StreamConfig, TransportConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
