//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Cause inference and degradation estimation."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::collections::HashMap;

use serde::Serialize;

use crate::cause::{Cause, DEFAULT_MAINTENANCE_ACTION};

/// Number of recent anomaly records aggregated by default.
pub const DEFAULT_WINDOW: usize = 100;

/// Message returned when the window holds no anomalies at all.
pub const NO_RECENT_ANOMALIES_MESSAGE: &str =
    "No recent anomalies detected. Routine maintenance recommended.";

/// One aggregated maintenance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceSuggestion {
    pub probable_cause: String,
    pub occurrences: usize,
    pub recommended_action: String,
}

/// Aggregate cause labels into maintenance suggestions.
///
/// `causes` must be ordered newest-first; only the first `window` labels
/// are considered. Rows are sorted by occurrence count descending, ties
/// kept in first-seen order, so the most recent of two equally frequent
/// causes lists first.
pub fn aggregate_maintenance(causes: &[String], window: usize) -> Vec<MaintenanceSuggestion> {
    let windowed = &causes[..causes.len().min(window)];

    let mut first_seen: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for cause in windowed {
        let entry = counts.entry(cause.as_str()).or_insert(0);
        if *entry == 0 {
            first_seen.push(cause.as_str());
        }
        *entry += 1;
    }

    let mut suggestions: Vec<MaintenanceSuggestion> = first_seen
        .into_iter()
        .map(|label| MaintenanceSuggestion {
            probable_cause: label.to_owned(),
            occurrences: counts[label],
            recommended_action: Cause::from_label(label)
                .map(|cause| cause.maintenance_action())
                .unwrap_or(DEFAULT_MAINTENANCE_ACTION)
                .to_owned(),
        })
        .collect();
    // Stable sort keeps the first-seen order within equal counts.
    suggestions.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    suggestions
}
