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

use r_fhm_common::config::SimulatorConfig;

use crate::sample::{round2, FuelSample};

/// Abnormal temperature bands the generator excurses into. The healthy
/// profile never reaches either band, so band membership alone marks a
/// synthetic fault.
const COLD_BAND: (f64, f64) = (-40.0, -20.0);
const HOT_BAND: (f64, f64) = (56.0, 80.0);

/// Generates synthetic fuel-system samples following the engine's steady
/// flight profile, with occasional excursions into abnormal temperature
/// bands at the configured probability.
#[derive(Debug)]
pub struct FuelSimulator {
    config: SimulatorConfig,
    rng: StdRng,
}

impl FuelSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Produce one sample. Cannot fail; every draw is bounded.
    pub fn sample(&mut self) -> FuelSample {
        let rpm = self
            .rng
            .gen_range(self.config.rpm_min..=self.config.rpm_max);
        let mut sample = FuelSample::raw(rpm, 0.0, 0.0, 0.0, 0.0);
        sample.recompute_throttle();
        sample.fuel_pressure =
            round2(2.5 + f64::from(rpm) / 1000.0 + self.rng.gen_range(-0.2..0.2));
        sample.fuel_temp = if self.rng.gen_bool(self.config.temp_excursion_probability) {
            if self.rng.gen_bool(0.5) {
                round2(self.rng.gen_range(COLD_BAND.0..COLD_BAND.1))
            } else {
                round2(self.rng.gen_range(HOT_BAND.0..HOT_BAND.1))
            }
        } else {
            round2(20.0 + f64::from(rpm) / 200.0 + self.rng.gen_range(-1.0..1.0))
        };
        sample.flow_rate = round2(0.1 * sample.throttle + self.rng.gen_range(0.0..1.0));
        sample
    }
}
