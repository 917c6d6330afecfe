//! ---
//! fhm_section: "02-messaging-ipc-data-model"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Broadcast payload model and transport backends."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use r_fhm_telemetry::FuelSample;

/// Raw sensor fields broadcast to subscribers.
///
/// Diagnostic enrichment (`anomaly`, `score`, causes) is deliberately
/// withheld from the broadcast; subscribers receive sensor readings only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedSample {
    /// Engine revolutions per minute.
    pub rpm: u32,
    /// Throttle opening, percent.
    pub throttle: f64,
    /// Fuel pressure, bar.
    pub fuel_pressure: f64,
    /// Fuel temperature, degrees Celsius.
    pub fuel_temp: f64,
    /// Fuel flow rate, litres per minute.
    pub flow_rate: f64,
}

impl From<&FuelSample> for ReducedSample {
    fn from(sample: &FuelSample) -> Self {
        Self {
            rpm: sample.rpm,
            throttle: sample.throttle,
            fuel_pressure: sample.fuel_pressure,
            fuel_temp: sample.fuel_temp,
            flow_rate: sample.flow_rate,
        }
    }
}

/// One payload as it sits on the bus, tagged with its topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Published {
    /// Topic the payload was published under.
    pub topic: String,
    /// The reduced sensor payload.
    pub payload: ReducedSample,
    /// When the payload entered the transport.
    pub published_at: DateTime<Utc>,
}

impl Published {
    /// Wrap a payload for the given topic, stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: ReducedSample) -> Self {
        Self {
            topic: topic.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}
