//! ---
//! fhm_section: "11-simulation-telemetry"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Synthetic telemetry generation and fault drills."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::sample::{round2, FuelSample};

/// Named fault profiles recognised by the injector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FaultKind {
    InjectorClog,
    SensorFailure,
    FuelLeak,
    RpmSurge,
    ThrottleSpike,
}

/// Applies a named fault profile to a copy of a sample.
///
/// Injection never fails: a profile name the injector does not recognise
/// leaves every numeric field untouched and annotates the copy instead,
/// so drill harnesses can pass arbitrary names without breaking the
/// pipeline. The requested profile name is always recorded on the copy.
#[derive(Debug)]
pub struct FaultInjector {
    rng: StdRng,
}

impl FaultInjector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn inject(&mut self, sample: &FuelSample, fault_type: &str) -> FuelSample {
        let mut out = sample.clone();
        match fault_type.parse::<FaultKind>() {
            Ok(kind) => self.apply(&mut out, kind),
            Err(_) => {
                out.note = Some(format!("unknown fault type '{}': no effect", fault_type));
            }
        }
        out.fault_type = Some(fault_type.to_owned());
        out
    }

    fn apply(&mut self, sample: &mut FuelSample, kind: FaultKind) {
        match kind {
            FaultKind::InjectorClog => {
                sample.flow_rate *= 0.3;
            }
            FaultKind::SensorFailure => {
                sample.fuel_temp = 999.0;
            }
            FaultKind::FuelLeak => {
                sample.fuel_pressure -= 2.0;
            }
            FaultKind::RpmSurge => {
                sample.rpm += 2000;
                sample.recompute_throttle();
            }
            FaultKind::ThrottleSpike => {
                sample.throttle = 100.0;
                sample.flow_rate = round2(10.0 + self.rng.gen_range(0.0..2.0));
            }
        }
    }
}
