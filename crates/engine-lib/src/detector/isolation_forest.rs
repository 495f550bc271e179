//! Isolation forest detection
//!
//! Tree-based unsupervised estimator: anomalous points are isolated by
//! random axis-aligned splits in fewer steps than normal points, so a
//! shorter average path depth means a more anomalous point. Fitting is
//! deterministic for a given `random_state`.

use super::{invert_min_max, ScoringModel, StandardScaler};
use crate::config::IsolationForestConfig;
use crate::models::Algorithm;
use anyhow::{bail, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant, for the harmonic-number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// One node of an isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        size: usize,
    },
}

impl TreeNode {
    /// Path depth of a sample, with the standard correction for the
    /// unexplored subtree below each leaf
    fn path_length(&self, data: &Array2<f64>, row: usize) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if data[[row, *feature]] < *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Fitted isolation forest together with its own feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    trees: Vec<TreeNode>,
    /// Subsample size each tree was grown on
    subsample_size: usize,
    scaler: StandardScaler,
    contamination: f64,
    n_estimators: usize,
    random_state: u64,
}

impl ForestModel {
    /// Fit a forest on a training feature matrix
    pub fn fit(features: &Array2<f64>, config: &IsolationForestConfig) -> Result<Self> {
        if features.nrows() < 2 {
            bail!(
                "isolation forest needs at least 2 training rows, got {}",
                features.nrows()
            );
        }
        if config.n_estimators == 0 || config.max_samples == 0 {
            bail!("n_estimators and max_samples must be positive");
        }

        let (scaler, scaled) = StandardScaler::fit_transform(features)?;
        let n = scaled.nrows();
        let subsample_size = config.max_samples.min(n);
        // Trees are grown until the expected isolation depth of the subsample
        let height_limit = (subsample_size as f64).log2().ceil().max(1.0) as usize;

        let mut rng = ChaCha20Rng::seed_from_u64(config.random_state);
        let mut trees = Vec::with_capacity(config.n_estimators);
        for _ in 0..config.n_estimators {
            let rows: Vec<usize> = rand::seq::index::sample(&mut rng, n, subsample_size).into_vec();
            trees.push(build_tree(&scaled, &rows, 0, height_limit, &mut rng));
        }

        Ok(Self {
            trees,
            subsample_size,
            scaler,
            contamination: config.contamination,
            n_estimators: config.n_estimators,
            random_state: config.random_state,
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Decision function over already-scaled features, lower = more anomalous
    fn decision_scores(&self, scaled: &Array2<f64>) -> Array1<f64> {
        let c = average_path_length(self.subsample_size).max(f64::EPSILON);
        let n_trees = self.trees.len() as f64;

        Array1::from_iter((0..scaled.nrows()).map(|row| {
            let mean_depth = self
                .trees
                .iter()
                .map(|t| t.path_length(scaled, row))
                .sum::<f64>()
                / n_trees;
            0.5 - 2.0_f64.powf(-mean_depth / c)
        }))
    }
}

impl ScoringModel for ForestModel {
    fn algorithm(&self) -> Algorithm {
        Algorithm::IsolationForest
    }

    fn raw_scores(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(features)?;
        Ok(self.decision_scores(&scaled))
    }

    fn normalize(&self, raw: &Array1<f64>) -> Array1<f64> {
        invert_min_max(raw)
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_tree(
    data: &Array2<f64>,
    rows: &[usize],
    depth: usize,
    limit: usize,
    rng: &mut ChaCha20Rng,
) -> TreeNode {
    if depth >= limit || rows.len() <= 1 {
        return TreeNode::Leaf { size: rows.len() };
    }

    // Only columns with spread among these rows can split them
    let mut candidates = Vec::new();
    for c in 0..data.ncols() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &r in rows {
            let v = data[[r, c]];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if hi - lo > f64::EPSILON {
            candidates.push((c, lo, hi));
        }
    }
    if candidates.is_empty() {
        return TreeNode::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| data[[r, feature]] < threshold);
    if left_rows.is_empty() || right_rows.is_empty() {
        return TreeNode::Leaf { size: rows.len() };
    }

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, &left_rows, depth + 1, limit, rng)),
        right: Box::new(build_tree(data, &right_rows, depth + 1, limit, rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IsolationForestConfig {
        IsolationForestConfig {
            enabled: true,
            contamination: 0.05,
            n_estimators: 50,
            max_samples: 64,
            random_state: 42,
        }
    }

    /// Tight cluster around (0, 0) with one far outlier appended
    fn cluster_with_outlier() -> Array2<f64> {
        let mut rows = Vec::new();
        for i in 0..100 {
            let a = (i % 10) as f64 * 0.1;
            let b = (i / 10) as f64 * 0.1;
            rows.push([a, b]);
        }
        rows.push([10.0, 10.0]);
        Array2::from_shape_vec(
            (rows.len(), 2),
            rows.into_iter().flatten().collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_outlier_scores_lowest() {
        let data = cluster_with_outlier();
        let model = ForestModel::fit(&data, &test_config()).unwrap();
        let scores = model.raw_scores(&data).unwrap();

        let outlier_score = scores[scores.len() - 1];
        let min_inlier = scores
            .iter()
            .take(scores.len() - 1)
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert!(
            outlier_score < min_inlier,
            "outlier {} should score below all inliers (min {})",
            outlier_score,
            min_inlier
        );
    }

    #[test]
    fn test_fit_deterministic_for_fixed_seed() {
        let data = cluster_with_outlier();
        let a = ForestModel::fit(&data, &test_config()).unwrap();
        let b = ForestModel::fit(&data, &test_config()).unwrap();

        let scores_a = a.raw_scores(&data).unwrap();
        let scores_b = b.raw_scores(&data).unwrap();
        assert_eq!(scores_a, scores_b);
    }

    #[test]
    fn test_normalized_outlier_is_exactly_one() {
        let data = cluster_with_outlier();
        let model = ForestModel::fit(&data, &test_config()).unwrap();
        let raw = model.raw_scores(&data).unwrap();
        let normalized = model.normalize(&raw);
        assert_eq!(normalized[normalized.len() - 1], 1.0);
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let data = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        assert!(ForestModel::fit(&data, &test_config()).is_err());
    }

    #[test]
    fn test_average_path_length_small_n() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(64));
    }
}
