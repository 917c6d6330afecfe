//! ---
//! fhm_section: "01-core-functionality"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Shared primitives and utilities for the fuel health monitor runtime."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Build identity reported by the daemon and exported as a metric label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub semver: String,
    pub profile: String,
}

impl VersionInfo {
    /// Capture the version of the binary currently executing.
    pub fn current() -> Self {
        let profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        };
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            profile: profile.to_owned(),
        }
    }

    /// Human-readable form used by `--version` style output.
    pub fn extended(&self) -> String {
        format!("R-FHM {} ({})", self.semver, self.profile)
    }
}
