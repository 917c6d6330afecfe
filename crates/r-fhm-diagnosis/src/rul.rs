//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Cause inference and degradation estimation."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Sentinel reported when no anomaly history exists.
pub const NO_FAILURE_PREDICTED: &str =
    "Component operating normally. No critical failure predicted.";

/// Projection multiplier applied to the average anomaly gap. Fixed
/// policy, not a tunable.
const GAP_MULTIPLIER: f64 = 2.0;

/// Remaining-useful-life verdict.
///
/// Serialises as a bare day count, or as the sentinel string when the
/// history is empty, preserving the untagged wire shape consumers
/// already parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulEstimate {
    Days(i64),
    NoFailurePredicted,
}

impl Serialize for RulEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RulEstimate::Days(days) => serializer.serialize_i64(*days),
            RulEstimate::NoFailurePredicted => serializer.serialize_str(NO_FAILURE_PREDICTED),
        }
    }
}

/// Project remaining useful life from anomaly spacing.
///
/// `timestamps` must be in ascending order. The covered span floors at
/// one day so bursts inside a single day still yield a finite estimate;
/// shorter average gaps between anomalies project a shorter remaining
/// life.
pub fn estimate_rul(timestamps: &[DateTime<Utc>]) -> RulEstimate {
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return RulEstimate::NoFailurePredicted;
    };
    let days_covered = (*last - *first).num_days().max(1);
    let avg_gap = days_covered as f64 / timestamps.len() as f64;
    RulEstimate::Days((avg_gap * GAP_MULTIPLIER).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_history_predicts_no_failure() {
        assert_eq!(estimate_rul(&[]), RulEstimate::NoFailurePredicted);
    }

    #[test]
    fn single_anomaly_floors_the_span_to_one_day() {
        assert_eq!(estimate_rul(&[day(5)]), RulEstimate::Days(2));
    }

    #[test]
    fn ten_day_pair_projects_ten_days() {
        assert_eq!(estimate_rul(&[day(1), day(11)]), RulEstimate::Days(10));
    }

    #[test]
    fn denser_anomalies_shorten_the_projection() {
        let sparse = estimate_rul(&[day(1), day(13)]);
        let dense = estimate_rul(&[day(1), day(4), day(7), day(10), day(13)]);
        let (RulEstimate::Days(sparse), RulEstimate::Days(dense)) = (sparse, dense) else {
            panic!("both projections should be finite");
        };
        assert!(dense < sparse);
    }

    #[test]
    fn same_day_burst_still_projects() {
        let burst = vec![day(5); 6];
        assert_eq!(estimate_rul(&burst), RulEstimate::Days(0));
    }

    #[test]
    fn wire_form_is_untagged() {
        assert_eq!(
            serde_json::to_string(&RulEstimate::Days(14)).unwrap(),
            "14"
        );
        assert_eq!(
            serde_json::to_string(&RulEstimate::NoFailurePredicted).unwrap(),
            format!("\"{}\"", NO_FAILURE_PREDICTED)
        );
    }
}
