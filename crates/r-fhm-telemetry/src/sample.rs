//! ---
//! fhm_section: "11-simulation-telemetry"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Synthetic telemetry generation and fault drills."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use r_fhm_common::time::utc_now;

/// Throttle percentage is derived from rotor speed against a fixed idle
/// baseline. Both constants are flight-profile policy, not tunables.
pub const THROTTLE_BASE_RPM: f64 = 1500.0;
pub const THROTTLE_SCALE: f64 = 25.0;

/// Round to two decimals, matching the precision of the sensor feed.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to four decimals, used when surfacing anomaly scores to operators.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// One fuel-system observation as it travels through the pipeline.
///
/// The raw sensor fields are always present. The diagnostic fields are
/// populated in stages: the scorer fills `anomaly`/`score` when a model is
/// loaded, the diagnosis engine fills `probable_cause` for flagged samples,
/// and the fault injector records `fault_type` (plus `note` for drills it
/// does not recognise). Absent fields are omitted from the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSample {
    pub timestamp: DateTime<Utc>,
    pub rpm: u32,
    pub throttle: f64,
    pub fuel_pressure: f64,
    pub fuel_temp: f64,
    pub flow_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probable_cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_measures: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FuelSample {
    /// Build a raw sample stamped with the current UTC time and no
    /// diagnostic annotations.
    pub fn raw(rpm: u32, throttle: f64, fuel_pressure: f64, fuel_temp: f64, flow_rate: f64) -> Self {
        Self {
            timestamp: utc_now(),
            rpm,
            throttle,
            fuel_pressure,
            fuel_temp,
            flow_rate,
            anomaly: None,
            score: None,
            probable_cause: None,
            fault_type: None,
            safety_measures: None,
            note: None,
        }
    }

    /// Feature vector the anomaly model is fitted on. Throttle is excluded
    /// because it is fully determined by rpm.
    pub fn features(&self) -> [f64; 4] {
        [
            f64::from(self.rpm),
            self.fuel_pressure,
            self.fuel_temp,
            self.flow_rate,
        ]
    }

    /// Re-derive throttle from the current rpm. Must be called after any
    /// mutation of `rpm` so the derived-field invariant holds.
    pub fn recompute_throttle(&mut self) {
        self.throttle = round2((f64::from(self.rpm) - THROTTLE_BASE_RPM) / THROTTLE_SCALE);
    }

    pub fn is_anomalous(&self) -> bool {
        self.anomaly == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_tracks_rpm() {
        let mut sample = FuelSample::raw(1500, 0.0, 3.0, 25.0, 4.0);
        sample.recompute_throttle();
        assert!((sample.throttle - 0.0).abs() < f64::EPSILON);

        sample.rpm = 4000;
        sample.recompute_throttle();
        assert!((sample.throttle - 100.0).abs() < f64::EPSILON);

        sample.rpm = 2625;
        sample.recompute_throttle();
        assert!((sample.throttle - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn features_exclude_throttle() {
        let sample = FuelSample::raw(3000, 60.0, 5.4, 34.8, 6.7);
        assert_eq!(sample.features(), [3000.0, 5.4, 34.8, 6.7]);
    }

    #[test]
    fn wire_form_omits_absent_diagnostics() {
        let sample = FuelSample::raw(2000, 20.0, 4.4, 30.1, 2.9);
        let json = serde_json::to_value(&sample).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("rpm"));
        assert!(!object.contains_key("anomaly"));
        assert!(!object.contains_key("score"));
        assert!(!object.contains_key("probable_cause"));
        assert!(!object.contains_key("fault_type"));
        assert!(!object.contains_key("note"));
    }

    #[test]
    fn wire_form_keeps_populated_diagnostics() {
        let mut sample = FuelSample::raw(2000, 20.0, 4.4, 30.1, 2.9);
        sample.anomaly = Some(true);
        sample.score = Some(-0.04219);
        sample.probable_cause = Some("Overheating sensor or coolant failure".to_owned());
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["anomaly"], serde_json::Value::Bool(true));
        assert!(json["score"].as_f64().unwrap() < 0.0);
        assert!(json["probable_cause"].as_str().unwrap().contains("Overheating"));
    }

    #[test]
    fn rounding_helpers_clip_precision() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(9.8765), 9.88);
        assert_eq!(round4(-0.042194321), -0.0422);
    }
}
