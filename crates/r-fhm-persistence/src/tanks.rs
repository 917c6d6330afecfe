//! ---
//! fhm_section: "03-persistence-logging"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Persistence abstractions and storage bindings."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{PersistenceError, Result};

/// Identifiers provisioned by [`TankRegistry::provision_default_tanks`].
pub const DEFAULT_TANK_IDS: [&str; 3] = ["TANK-1", "TANK-2", "TANK-3"];

/// Operational state of one fuel tank.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum TankStatus {
    /// Tank is in service.
    Active,
    /// Tank is out of service.
    Inactive,
    /// Tank is undergoing maintenance.
    #[serde(rename = "Under Maintenance")]
    #[strum(serialize = "Under Maintenance")]
    UnderMaintenance,
}

/// One fuel tank as stored in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tank {
    /// Stable identifier, e.g. `TANK-1`.
    pub tank_id: String,
    /// Current operational status.
    pub status: TankStatus,
}

/// JSON-file-backed registry of fuel tanks.
///
/// The whole registry is small enough to rewrite atomically on every
/// mutation; reads are served from the in-memory copy.
pub struct TankRegistry {
    path: PathBuf,
    tanks: RwLock<Vec<Tank>>,
}

impl TankRegistry {
    /// Open a registry, loading existing tanks if the file is present.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tanks = if path.exists() {
            let file = File::open(path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tanks: RwLock::new(tanks),
        })
    }

    /// Replace the registry with the three default tanks, all `Active`.
    pub fn provision_default_tanks(&self) -> Result<Vec<Tank>> {
        let tanks: Vec<Tank> = DEFAULT_TANK_IDS
            .iter()
            .map(|id| Tank {
                tank_id: (*id).to_owned(),
                status: TankStatus::Active,
            })
            .collect();

        {
            let mut guard = self.tanks.write();
            *guard = tanks.clone();
            self.persist(&guard)?;
        }
        info!(count = tanks.len(), "fuel tanks provisioned");
        Ok(tanks)
    }

    /// Snapshot of every tank.
    pub fn all(&self) -> Vec<Tank> {
        self.tanks.read().clone()
    }

    /// Set the status of one tank, persisting the change.
    pub fn update_status(&self, tank_id: &str, status: TankStatus) -> Result<Tank> {
        let mut guard = self.tanks.write();
        let tank = guard
            .iter_mut()
            .find(|tank| tank.tank_id == tank_id)
            .ok_or_else(|| PersistenceError::TankNotFound(tank_id.to_owned()))?;
        tank.status = status;
        let updated = tank.clone();
        self.persist(&guard)?;
        Ok(updated)
    }

    fn persist(&self, tanks: &[Tank]) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, tanks)?;
        writer.flush()?;
        Ok(())
    }
}
