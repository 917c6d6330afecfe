//! ---
//! fhm_section: "08-prognostics-models"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Outlier detection model for fuel-system telemetry."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use r_fhm_common::config::ModelConfig;

use crate::errors::{ModelError, Result};
use crate::tree::{c_factor, IsolationTree};
use crate::FeatureVector;

/// Verdict for a single scored observation.
///
/// `score` follows the decision-function convention: positive for
/// inliers, negative for outliers, `anomaly == (score < 0)`. Retraining
/// is the only way to move the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub anomaly: bool,
    pub score: f64,
}

/// A fitted isolation forest.
///
/// Immutable after `fit`, so a single instance can be shared behind an
/// `Arc` by the streaming loop and any number of request handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    trained_rows: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit a forest on the full training set.
    ///
    /// Each tree trains on a Fisher-Yates subsample without replacement,
    /// capped at the configured per-tree sample size, with the depth cap
    /// derived as `ceil(log2(sample size))`. The decision offset is the
    /// `(1 - contamination)` quantile of the training scores, so roughly
    /// the configured fraction of training rows lands on the outlier side.
    pub fn fit(config: &ModelConfig, rows: &[FeatureVector]) -> Result<Self> {
        if rows.len() < config.min_training_samples {
            return Err(ModelError::InsufficientData {
                have: rows.len(),
                need: config.min_training_samples,
            });
        }

        let per_tree = config.tree_sample_size.min(rows.len());
        let max_depth = (per_tree as f64).log2().ceil().max(1.0) as u32;
        let mut subsampler = StdRng::seed_from_u64(config.seed);

        let mut trees = Vec::with_capacity(config.trees);
        for i in 0..config.trees {
            let subset = sample_subset(rows, per_tree, &mut subsampler);
            let tree_seed = config.seed.wrapping_add(i as u64);
            trees.push(IsolationTree::fit(&subset, max_depth, tree_seed));
        }

        let mut forest = Self {
            trees,
            trained_rows: rows.len(),
            offset: 0.0,
        };
        forest.offset = forest.training_offset(rows, config.contamination);
        info!(
            trained_rows = forest.trained_rows,
            trees = forest.trees.len(),
            offset = forest.offset,
            "isolation forest fitted"
        );
        Ok(forest)
    }

    /// Normalised anomaly score in (0, 1): higher means easier to
    /// isolate, hence more anomalous.
    pub fn anomaly_score(&self, features: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(features))
            .sum();
        let avg_path = total / self.trees.len() as f64;
        2f64.powf(-avg_path / c_factor(self.trained_rows))
    }

    /// Signed decision value: positive inside the boundary, negative
    /// outside.
    pub fn decision(&self, features: &FeatureVector) -> f64 {
        self.offset - self.anomaly_score(features)
    }

    pub fn score(&self, features: &FeatureVector) -> ScoreResult {
        let score = self.decision(features);
        ScoreResult {
            anomaly: score < 0.0,
            score,
        }
    }

    pub fn trained_rows(&self) -> usize {
        self.trained_rows
    }

    /// Quantile of the training scores used as the decision boundary,
    /// taken at the upper nearest rank.
    fn training_offset(&self, rows: &[FeatureVector], contamination: f64) -> f64 {
        let mut scores: Vec<f64> = rows.iter().map(|row| self.anomaly_score(row)).collect();
        scores.sort_by(f64::total_cmp);
        let rank = ((scores.len() - 1) as f64 * (1.0 - contamination)).ceil() as usize;
        scores[rank.min(scores.len() - 1)]
    }
}

/// Random subsample without replacement via a partial Fisher-Yates
/// shuffle over the row indices.
fn sample_subset(
    rows: &[FeatureVector],
    sample_size: usize,
    rng: &mut StdRng,
) -> Vec<FeatureVector> {
    if sample_size >= rows.len() {
        return rows.to_vec();
    }
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    for i in 0..sample_size {
        let j = i + rng.gen_range(0..rows.len() - i);
        indices.swap(i, j);
    }
    indices[..sample_size].iter().map(|&i| rows[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_rows(count: usize) -> Vec<FeatureVector> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..count)
            .map(|_| {
                [
                    rng.gen_range(2500.0..2700.0),
                    rng.gen_range(5.0..5.3),
                    rng.gen_range(32.0..35.0),
                    rng.gen_range(6.0..6.6),
                ]
            })
            .collect()
    }

    fn test_config() -> ModelConfig {
        ModelConfig {
            trees: 50,
            tree_sample_size: 64,
            contamination: 0.05,
            min_training_samples: 20,
            seed: 42,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn refuses_to_fit_below_the_row_floor() {
        let rows = training_rows(7);
        match IsolationForest::fit(&test_config(), &rows) {
            Err(ModelError::InsufficientData { have, need }) => {
                assert_eq!(have, 7);
                assert_eq!(need, 20);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn flags_a_gross_outlier_and_accepts_the_centroid() {
        let rows = training_rows(200);
        let forest = IsolationForest::fit(&test_config(), &rows).unwrap();

        let outlier = forest.score(&[4100.0, 0.9, 999.0, 0.3]);
        assert!(outlier.anomaly);
        assert!(outlier.score < 0.0);

        let centroid = forest.score(&[2600.0, 5.15, 33.5, 6.3]);
        assert!(!centroid.anomaly);
        assert!(centroid.score >= 0.0);
    }

    #[test]
    fn training_flag_rate_stays_near_contamination() {
        let rows = training_rows(200);
        let forest = IsolationForest::fit(&test_config(), &rows).unwrap();
        let flagged = rows.iter().filter(|row| forest.score(row).anomaly).count();
        assert!(
            flagged <= 20,
            "flagged {} of 200 training rows, expected about 5%",
            flagged
        );
    }

    #[test]
    fn fitting_is_deterministic_for_a_fixed_seed() {
        let rows = training_rows(120);
        let a = IsolationForest::fit(&test_config(), &rows).unwrap();
        let b = IsolationForest::fit(&test_config(), &rows).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn scores_are_stable_across_repeated_calls() {
        let rows = training_rows(80);
        let forest = IsolationForest::fit(&test_config(), &rows).unwrap();
        let probe = [2700.0, 5.2, 34.0, 6.4];
        assert_eq!(forest.decision(&probe), forest.decision(&probe));
    }
}
