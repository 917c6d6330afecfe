//! ---
//! fhm_section: "03-persistence-logging"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Persistence abstractions and storage bindings."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! On-disk state for the fuel health monitor: an append-only JSONL
//! telemetry log and a small JSON-backed fuel-tank registry. Both are
//! safe to share between the streaming loop and request handlers.

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing persistence files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reported when a status update names a tank the registry does not hold.
    #[error("tank {0} not found")]
    TankNotFound(String),
    /// Reported when an existing log file does not start with a readable header.
    #[error("malformed telemetry log header in {0}")]
    MalformedHeader(String),
}

pub mod tanks;
pub mod telemetry_log;

pub use tanks::{Tank, TankRegistry, TankStatus};
pub use telemetry_log::{ScanOrder, TelemetryLog};
