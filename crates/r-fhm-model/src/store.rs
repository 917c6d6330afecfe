//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Outlier detection model for fuel-system telemetry."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::forest::IsolationForest;

/// Shared handle to the currently loaded model.
///
/// Readers take an `Arc` clone and keep scoring against it even while a
/// retrain installs a replacement; the swap is a single pointer update
/// under the write lock, never an in-place mutation. An empty store is
/// the degraded mode: callers skip scoring and pass raw telemetry
/// through.
#[derive(Debug, Default)]
pub struct ModelStore {
    inner: RwLock<Option<Arc<IsolationForest>>>,
}

impl ModelStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_model(forest: IsolationForest) -> Self {
        Self {
            inner: RwLock::new(Some(Arc::new(forest))),
        }
    }

    /// Snapshot of the current model, if any.
    pub fn current(&self) -> Option<Arc<IsolationForest>> {
        self.inner.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Atomically replace the active model.
    pub fn install(&self, forest: IsolationForest) {
        let trained_rows = forest.trained_rows();
        *self.inner.write() = Some(Arc::new(forest));
        info!(trained_rows, "anomaly model installed");
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_fhm_common::config::ModelConfig;

    fn fitted_forest(seed: u64) -> IsolationForest {
        let rows: Vec<[f64; 4]> = (0..30)
            .map(|i| [2500.0 + f64::from(i) * 2.0, 5.0, 33.0, 6.0])
            .collect();
        let config = ModelConfig {
            trees: 5,
            tree_sample_size: 16,
            seed,
            ..ModelConfig::default()
        };
        IsolationForest::fit(&config, &rows).unwrap()
    }

    #[test]
    fn empty_store_reports_degraded_mode() {
        let store = ModelStore::empty();
        assert!(!store.is_loaded());
        assert!(store.current().is_none());
    }

    #[test]
    fn install_swaps_the_handle_without_invalidating_readers() {
        let store = ModelStore::with_model(fitted_forest(1));
        let held = store.current().unwrap();
        let before = held.decision(&[2530.0, 5.0, 33.0, 6.0]);

        store.install(fitted_forest(2));

        // The old snapshot keeps scoring identically.
        assert_eq!(held.decision(&[2530.0, 5.0, 33.0, 6.0]), before);
        // New readers observe the replacement.
        assert!(!Arc::ptr_eq(&held, &store.current().unwrap()));
    }

    #[test]
    fn clear_returns_the_store_to_degraded_mode() {
        let store = ModelStore::with_model(fitted_forest(3));
        assert!(store.is_loaded());
        store.clear();
        assert!(store.current().is_none());
    }
}
