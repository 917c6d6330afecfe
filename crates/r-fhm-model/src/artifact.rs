//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Outlier detection model for fuel-system telemetry."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use tracing::debug;

use crate::errors::{ModelError, Result};
use crate::forest::IsolationForest;

pub const ARTIFACT_VERSION: u16 = 1;

/// On-disk form of a fitted model.
///
/// The digest covers the serialized forest payload, so a truncated or
/// hand-edited artifact is rejected at load time instead of silently
/// scoring with corrupt trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u16,
    pub created_at: DateTime<Utc>,
    pub trained_rows: usize,
    pub digest: String,
    pub forest: IsolationForest,
}

impl ModelArtifact {
    pub fn new(forest: IsolationForest) -> Result<Self> {
        let digest = forest_digest(&forest)?;
        Ok(Self {
            version: ARTIFACT_VERSION,
            created_at: Utc::now(),
            trained_rows: forest.trained_rows(),
            digest,
            forest,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), trained_rows = self.trained_rows, "model artifact written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&contents)?;
        let computed = forest_digest(&artifact.forest)?;
        if computed != artifact.digest {
            return Err(ModelError::DigestMismatch {
                stored: artifact.digest,
                computed,
            });
        }
        debug!(path = %path.display(), trained_rows = artifact.trained_rows, "model artifact loaded");
        Ok(artifact)
    }

    /// Load the artifact if one exists. An absent file is the normal
    /// cold-start state, not an error.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        match Self::load(path) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(ModelError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn forest_digest(forest: &IsolationForest) -> Result<String> {
    let payload = serde_json::to_string(forest)?;
    Ok(format!("{:x}", sha2::Sha256::digest(payload.as_bytes())))
}
