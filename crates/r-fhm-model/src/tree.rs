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

use crate::{FeatureVector, FEATURE_COUNT};

const EULER_MASCHERONI: f64 = 0.577_215_664_9;

/// Number of random feature draws attempted before falling back to a
/// median split on the first feature.
const SPLIT_RETRIES: usize = 10;

/// One node of an isolation tree, stored in a flat arena indexed by
/// `u32`. Child indices always point forward in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: u8,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        size: u32,
    },
}

/// A single isolation tree fitted on a subsample of the training rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    /// Fit a tree by recursive random partitioning. Recursion stops at
    /// the depth cap, on singleton or identical partitions, or when a
    /// split fails to separate the rows.
    pub fn fit(rows: &[FeatureVector], max_depth: u32, seed: u64) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut rng = StdRng::seed_from_u64(seed);
        if !rows.is_empty() {
            tree.build(rows, 0, max_depth, &mut rng);
        }
        tree
    }

    fn build(
        &mut self,
        rows: &[FeatureVector],
        depth: u32,
        max_depth: u32,
        rng: &mut StdRng,
    ) -> u32 {
        if depth >= max_depth || rows.len() <= 1 || all_same(rows) {
            return self.push(Node::Leaf {
                size: rows.len() as u32,
            });
        }

        let (feature, threshold) = select_split(rows, rng);
        let (left_rows, right_rows) = partition(rows, feature, threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return self.push(Node::Leaf {
                size: rows.len() as u32,
            });
        }

        let index = self.push(Node::Split {
            feature,
            threshold,
            left: 0,
            right: 0,
        });
        let left = self.build(&left_rows, depth + 1, max_depth, rng);
        let right = self.build(&right_rows, depth + 1, max_depth, rng);
        if let Node::Split {
            left: slot_left,
            right: slot_right,
            ..
        } = &mut self.nodes[index as usize]
        {
            *slot_left = left;
            *slot_right = right;
        }
        index
    }

    fn push(&mut self, node: Node) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        index
    }

    /// Path length from the root to the leaf isolating `features`, with
    /// the standard unfinished-search adjustment for leaf size.
    pub fn path_length(&self, features: &FeatureVector) -> f64 {
        let mut index = 0usize;
        let mut edges = 0.0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    edges += 1.0;
                    index = if features[*feature as usize] < *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                Some(Node::Leaf { size }) => {
                    return edges + c_factor(*size as usize);
                }
                None => return edges,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn all_same(rows: &[FeatureVector]) -> bool {
    match rows.split_first() {
        Some((first, rest)) => rest.iter().all(|row| row == first),
        None => true,
    }
}

/// Pick a random feature with non-degenerate range and a uniform split
/// value inside that range. Once the retries are exhausted, fall back to
/// the median of the first feature.
fn select_split(rows: &[FeatureVector], rng: &mut StdRng) -> (u8, f64) {
    for _ in 0..SPLIT_RETRIES {
        let feature = rng.gen_range(0..FEATURE_COUNT);
        let (min_value, max_value) = feature_range(rows, feature);
        if (max_value - min_value).abs() < f64::EPSILON {
            continue;
        }
        return (feature as u8, rng.gen_range(min_value..max_value));
    }
    (0, median_value(rows, 0))
}

fn feature_range(rows: &[FeatureVector], feature: usize) -> (f64, f64) {
    let mut min_value = f64::INFINITY;
    let mut max_value = f64::NEG_INFINITY;
    for row in rows {
        min_value = min_value.min(row[feature]);
        max_value = max_value.max(row[feature]);
    }
    (min_value, max_value)
}

fn median_value(rows: &[FeatureVector], feature: usize) -> f64 {
    let mut values: Vec<f64> = rows.iter().map(|row| row[feature]).collect();
    values.sort_by(f64::total_cmp);
    values[values.len() / 2]
}

fn partition(
    rows: &[FeatureVector],
    feature: u8,
    threshold: f64,
) -> (Vec<FeatureVector>, Vec<FeatureVector>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for row in rows {
        if row[feature as usize] < threshold {
            left.push(*row);
        } else {
            right.push(*row);
        }
    }
    (left, right)
}

/// Average path length of an unsuccessful binary search over `n` items:
/// `2 H(n-1) - 2 (n-1) / n`. Zero for degenerate leaves.
pub fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    2.0 * harmonic(n - 1) - 2.0 * (n as f64 - 1.0) / n as f64
}

fn harmonic(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    if n <= 256 {
        (1..=n).map(|i| 1.0 / i as f64).sum()
    } else {
        (n as f64).ln() + EULER_MASCHERONI + 0.5 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_rows() -> Vec<FeatureVector> {
        let mut rows = Vec::new();
        for i in 0..24 {
            let drift = f64::from(i) * 0.05;
            rows.push([2600.0 + drift, 5.1 + drift * 0.01, 33.0 + drift, 6.2]);
        }
        rows.push([4100.0, 1.1, 999.0, 0.4]);
        rows
    }

    #[test]
    fn c_factor_matches_reference_values() {
        assert_eq!(c_factor(0), 0.0);
        assert_eq!(c_factor(1), 0.0);
        assert!((c_factor(2) - 1.0).abs() < 1e-9);
        assert!((c_factor(10) - 3.858).abs() < 0.001);
    }

    #[test]
    fn identical_rows_collapse_to_a_single_leaf() {
        let rows = vec![[2000.0, 4.5, 30.0, 5.0]; 12];
        let tree = IsolationTree::fit(&rows, 8, 3);
        assert_eq!(tree.node_count(), 1);
        assert!((tree.path_length(&rows[0]) - c_factor(12)).abs() < 1e-9);
    }

    #[test]
    fn outliers_take_shorter_paths_than_cluster_members() {
        let rows = clustered_rows();
        let mut cluster_total = 0.0;
        let mut outlier_total = 0.0;
        for seed in 0..16 {
            let tree = IsolationTree::fit(&rows, 8, seed);
            cluster_total += tree.path_length(&[2600.5, 5.11, 33.4, 6.2]);
            outlier_total += tree.path_length(&[4100.0, 1.1, 999.0, 0.4]);
        }
        assert!(
            outlier_total < cluster_total,
            "outlier paths ({}) should average shorter than cluster paths ({})",
            outlier_total,
            cluster_total
        );
    }

    #[test]
    fn depth_cap_bounds_the_arena() {
        let rows = clustered_rows();
        let shallow = IsolationTree::fit(&rows, 1, 5);
        // A depth-one tree is at most a root split with two leaves.
        assert!(shallow.node_count() <= 3);
    }
}
