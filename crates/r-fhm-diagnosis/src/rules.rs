//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Cause inference and degradation estimation."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use r_fhm_telemetry::FuelSample;

use crate::cause::Cause;

/// Flow below this rate is starved, in litres per minute.
pub const STARVED_FLOW_LPM: f64 = 2.0;
/// Pressure above this level is abnormal, in bar.
pub const HIGH_PRESSURE_BAR: f64 = 4.0;
/// Pressure below this level is abnormal, in bar.
pub const LOW_PRESSURE_BAR: f64 = 2.0;
/// Fuel temperature above this threshold indicates overheating, in °C.
pub const OVERHEAT_TEMP_C: f64 = 56.0;
/// Fuel temperature below this threshold indicates a cold failure, in °C.
pub const COLD_TEMP_C: f64 = -20.0;
/// Rotor speed above this threshold is a surge.
pub const SURGE_RPM: u32 = 5000;
/// Throttle beyond this opening is effectively stuck wide open, percent.
pub const WIDE_OPEN_THROTTLE_PCT: f64 = 90.0;
/// Flow above this rate is excessive, in litres per minute.
pub const EXCESS_FLOW_LPM: f64 = 8.0;

type Predicate = fn(&FuelSample) -> bool;

fn starved_flow_under_pressure(sample: &FuelSample) -> bool {
    sample.flow_rate < STARVED_FLOW_LPM && sample.fuel_pressure > HIGH_PRESSURE_BAR
}

fn overheating(sample: &FuelSample) -> bool {
    sample.fuel_temp > OVERHEAT_TEMP_C
}

fn cold_failure(sample: &FuelSample) -> bool {
    sample.fuel_temp < COLD_TEMP_C
}

fn low_pressure(sample: &FuelSample) -> bool {
    sample.fuel_pressure < LOW_PRESSURE_BAR
}

fn high_pressure(sample: &FuelSample) -> bool {
    sample.fuel_pressure > HIGH_PRESSURE_BAR
}

fn rpm_surge(sample: &FuelSample) -> bool {
    sample.rpm > SURGE_RPM
}

fn throttle_stuck_open(sample: &FuelSample) -> bool {
    sample.throttle > WIDE_OPEN_THROTTLE_PCT && sample.flow_rate > EXCESS_FLOW_LPM
}

/// The cascade, evaluated top to bottom with first match winning.
///
/// Order is load-bearing: the clogged-injector rule overlaps the plain
/// high-pressure rule, so the high-pressure arm only fires when flow is
/// not starved.
const CASCADE: &[(Predicate, Cause)] = &[
    (starved_flow_under_pressure, Cause::InjectorClog),
    (overheating, Cause::Overheating),
    (cold_failure, Cause::ColdFailure),
    (low_pressure, Cause::LowPressureLeak),
    (high_pressure, Cause::HighPressureLeak),
    (rpm_surge, Cause::RpmSurge),
    (throttle_stuck_open, Cause::ThrottleStuck),
];

/// Infer the probable cause for a sample already flagged anomalous.
pub fn diagnose(sample: &FuelSample) -> Cause {
    CASCADE
        .iter()
        .find(|(predicate, _)| predicate(sample))
        .map(|(_, cause)| *cause)
        .unwrap_or(Cause::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rpm: u32, throttle: f64, pressure: f64, temp: f64, flow: f64) -> FuelSample {
        FuelSample::raw(rpm, throttle, pressure, temp, flow)
    }

    #[test]
    fn starved_flow_under_pressure_reads_as_injector_clog() {
        let s = sample(2500, 40.0, 4.5, 33.0, 1.2);
        assert_eq!(diagnose(&s), Cause::InjectorClog);
    }

    #[test]
    fn hot_and_cold_excursions_hit_the_temperature_rules() {
        assert_eq!(diagnose(&sample(2500, 40.0, 3.0, 61.0, 5.0)), Cause::Overheating);
        assert_eq!(diagnose(&sample(2500, 40.0, 3.0, -33.0, 5.0)), Cause::ColdFailure);
    }

    #[test]
    fn pressure_rules_split_on_direction() {
        assert_eq!(diagnose(&sample(2500, 40.0, 1.0, 33.0, 5.0)), Cause::LowPressureLeak);
        assert_eq!(diagnose(&sample(2500, 40.0, 4.5, 33.0, 5.0)), Cause::HighPressureLeak);
    }

    #[test]
    fn surge_and_stuck_throttle_need_the_earlier_rules_clear() {
        assert_eq!(diagnose(&sample(5500, 160.0, 3.0, 33.0, 5.0)), Cause::RpmSurge);
        assert_eq!(diagnose(&sample(3800, 92.0, 3.0, 33.0, 9.5)), Cause::ThrottleStuck);
    }

    #[test]
    fn healthy_looking_features_fall_through_to_unknown() {
        assert_eq!(diagnose(&sample(2500, 40.0, 3.0, 33.0, 5.0)), Cause::Unknown);
    }

    #[test]
    fn injector_clog_shadows_every_later_rule() {
        // Satisfies rules 1, 2, 5, and 6 simultaneously; rule 1 must win.
        let s = sample(5500, 160.0, 4.8, 70.0, 1.0);
        assert_eq!(diagnose(&s), Cause::InjectorClog);
    }

    #[test]
    fn high_pressure_only_fires_when_flow_is_not_starved() {
        // Same pressure as the clog fixture, but healthy flow.
        let clogged = sample(2500, 40.0, 4.8, 33.0, 1.0);
        let flowing = sample(2500, 40.0, 4.8, 33.0, 5.0);
        assert_eq!(diagnose(&clogged), Cause::InjectorClog);
        assert_eq!(diagnose(&flowing), Cause::HighPressureLeak);
    }

    #[test]
    fn diagnosis_is_deterministic() {
        let s = sample(2500, 40.0, 4.5, 33.0, 1.2);
        let first = diagnose(&s);
        for _ in 0..100 {
            assert_eq!(diagnose(&s), first);
        }
    }

    #[test]
    fn leak_drill_lands_on_the_low_pressure_rule() {
        // A fuel_leak drill on a 3.0 bar baseline leaves 1.0 bar.
        let mut injector = r_fhm_telemetry::FaultInjector::new(5);
        let base = sample(2500, 40.0, 3.0, 33.0, 5.0);
        let leaked = injector.inject(&base, "fuel_leak");
        assert_eq!(leaked.fuel_pressure, 1.0);
        assert_eq!(diagnose(&leaked), Cause::LowPressureLeak);
    }
}
