//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Cause inference and degradation estimation."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fmt;

use strum::EnumIter;

/// Cause label reported for healthy samples on the safety path.
pub const NORMAL_OPERATION_LABEL: &str = "Normal operation";

/// Safety guidance for healthy samples.
pub const NORMAL_OPERATION_SAFETY: &str =
    "No safety action required. System operating within safe parameters.";

/// Fallback safety guidance for causes without a specific entry.
pub const DEFAULT_SAFETY_MEASURE: &str =
    "Follow standard emergency procedures. Refer to flight manual.";

/// Fallback maintenance action for cause labels the mapper does not
/// recognise, e.g. records written by an older build.
pub const DEFAULT_MAINTENANCE_ACTION: &str = "General system inspection advised.";

/// Canonical diagnosis labels.
///
/// One enumeration keys the cause cascade, the safety mapping, and the
/// maintenance mapping, so a produced cause can never miss its
/// recommendations through a vocabulary mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Cause {
    InjectorClog,
    Overheating,
    ColdFailure,
    LowPressureLeak,
    HighPressureLeak,
    RpmSurge,
    ThrottleStuck,
    Unknown,
}

impl Cause {
    /// Operator-facing label, also the stored wire form.
    pub fn label(&self) -> &'static str {
        match self {
            Cause::InjectorClog => "Fuel injector clog (low flow rate)",
            Cause::Overheating => "Overheating sensor or coolant failure",
            Cause::ColdFailure => "Cold sensor breakdown or coolant failure",
            Cause::LowPressureLeak => "Possible fuel leak or pump failure (low pressure)",
            Cause::HighPressureLeak => "Possible fuel leak or pump failure (high pressure)",
            Cause::RpmSurge => "Abnormal RPM surge or throttle malfunction",
            Cause::ThrottleStuck => "Throttle stuck open (excessive fuel injection)",
            Cause::Unknown => "Anomaly detected, cause unknown",
        }
    }

    /// Reverse lookup from a stored label.
    pub fn from_label(label: &str) -> Option<Cause> {
        use strum::IntoEnumIterator;
        Cause::iter().find(|cause| cause.label() == label)
    }

    /// In-flight guidance for the crew. Total over the enumeration.
    pub fn safety_measures(&self) -> &'static str {
        match self {
            Cause::InjectorClog => {
                "Reduce throttle immediately. Prepare for possible engine power loss. \
                 Return to base if feasible."
            }
            Cause::Overheating => {
                "Monitor engine temperature. Avoid sudden throttle increases. \
                 Prepare for emergency landing if required."
            }
            Cause::ColdFailure => {
                "Cross-check temperature readings against backup sensors. \
                 Treat coolant readings as suspect until verified."
            }
            Cause::LowPressureLeak => {
                "Monitor fuel usage carefully. Avoid aggressive maneuvers. \
                 Notify control and prepare for early landing."
            }
            Cause::HighPressureLeak => {
                "Reduce pump load and monitor pressure closely. \
                 Notify control and avoid prolonged high-power settings."
            }
            Cause::RpmSurge => {
                "Stabilise throttle input and reduce collective demand. \
                 Land as soon as practicable if surges repeat."
            }
            Cause::ThrottleStuck => {
                "Prepare for manual throttle control. Reduce power demand \
                 and plan a precautionary landing."
            }
            Cause::Unknown => DEFAULT_SAFETY_MEASURE,
        }
    }

    /// Ground-crew action once the aircraft is back. Total over the
    /// enumeration.
    pub fn maintenance_action(&self) -> &'static str {
        match self {
            Cause::InjectorClog => "Inspect injectors and clean fuel lines.",
            Cause::Overheating | Cause::ColdFailure => {
                "Check fuel cooling systems and thermal insulation."
            }
            Cause::LowPressureLeak | Cause::HighPressureLeak => {
                "Inspect and replace fuel filters and pressure regulators."
            }
            Cause::RpmSurge | Cause::ThrottleStuck => {
                "Examine engine control unit and throttle sensors."
            }
            Cause::Unknown => DEFAULT_MAINTENANCE_ACTION,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn labels_are_unique_and_reversible() {
        for cause in Cause::iter() {
            assert_eq!(Cause::from_label(cause.label()), Some(cause));
        }
        assert_eq!(Cause::from_label("definitely not a cause"), None);
    }

    #[test]
    fn every_cause_has_specific_recommendations() {
        for cause in Cause::iter() {
            assert!(!cause.safety_measures().is_empty());
            assert!(!cause.maintenance_action().is_empty());
        }
        // Only the unknown cause falls back to the generic guidance.
        for cause in Cause::iter().filter(|c| *c != Cause::Unknown) {
            assert_ne!(cause.safety_measures(), DEFAULT_SAFETY_MEASURE);
            assert_ne!(cause.maintenance_action(), DEFAULT_MAINTENANCE_ACTION);
        }
    }

    #[test]
    fn display_matches_the_stored_label() {
        assert_eq!(
            Cause::InjectorClog.to_string(),
            "Fuel injector clog (low flow rate)"
        );
    }
}
