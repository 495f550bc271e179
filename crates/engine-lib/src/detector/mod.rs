//! Detection algorithm families
//!
//! Each family fits a model from a feature matrix and scores new matrices,
//! one raw score per row. The [`ScoringModel`] trait is the single seam the
//! inference engine dispatches through: a new algorithm implements it once
//! and the dispatch logic never changes.

mod isolation_forest;
mod one_class_svm;
mod scaler;
mod zscore;

pub use isolation_forest::ForestModel;
pub use one_class_svm::SvmModel;
pub use scaler::StandardScaler;
pub use zscore::ZScoreModel;

use crate::models::Algorithm;
use anyhow::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Guard against division by zero in score normalization
pub const SCORE_EPSILON: f64 = 1e-10;

/// A fitted model that can score a feature matrix
///
/// `raw_scores` returns one algorithm-specific score per row. `normalize`
/// maps a batch of raw scores onto the shared [0, 1] scale where higher
/// means more anomalous, making scores comparable across families.
pub trait ScoringModel: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// One raw score per feature row
    fn raw_scores(&self, features: &Array2<f64>) -> Result<Array1<f64>>;

    /// Rescale a batch of raw scores to [0, 1], higher = more anomalous
    fn normalize(&self, raw: &Array1<f64>) -> Array1<f64>;

    /// The value the model considers normal, where that notion exists
    fn expected_value(&self) -> Option<f64> {
        None
    }
}

/// A trained artifact, keyed in the store by `(metric, algorithm)`
///
/// Published atomically by the trainer and only ever read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainedModel {
    /// Tagged `zscore` on disk, matching the algorithm's wire identifier
    #[serde(rename = "zscore")]
    ZScore(ZScoreModel),
    IsolationForest(ForestModel),
    OneClassSvm(SvmModel),
}

impl TrainedModel {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            TrainedModel::ZScore(_) => Algorithm::ZScore,
            TrainedModel::IsolationForest(_) => Algorithm::IsolationForest,
            TrainedModel::OneClassSvm(_) => Algorithm::OneClassSvm,
        }
    }

    /// View the artifact through the uniform scoring capability
    pub fn scoring(&self) -> &dyn ScoringModel {
        match self {
            TrainedModel::ZScore(m) => m,
            TrainedModel::IsolationForest(m) => m,
            TrainedModel::OneClassSvm(m) => m,
        }
    }

    /// Per-family configuration summary sent to the model registry
    pub fn registry_config(&self) -> serde_json::Value {
        match self {
            TrainedModel::ZScore(m) => serde_json::json!({
                "mean": m.mean,
                "std": m.std,
                "threshold": m.threshold,
            }),
            TrainedModel::IsolationForest(m) => serde_json::json!({
                "model_type": "isolation_forest",
                "n_estimators": m.n_estimators(),
                "contamination": m.contamination(),
            }),
            TrainedModel::OneClassSvm(m) => serde_json::json!({
                "model_type": "one_class_svm",
                "kernel": m.kernel(),
                "nu": m.nu(),
            }),
        }
    }
}

/// Min-max normalize a batch of raw scores and invert, so the lowest raw
/// score (most anomalous for decision-function models) maps to exactly 1.0
/// and the highest to exactly 0.0. An all-equal batch yields all zeros
/// rather than dividing by zero.
///
/// This is batch-relative on purpose: the most anomalous point of any batch
/// scores at or near 1.0 regardless of its absolute severity.
pub(crate) fn invert_min_max(raw: &Array1<f64>) -> Array1<f64> {
    if raw.is_empty() {
        return Array1::zeros(0);
    }

    let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    if spread <= SCORE_EPSILON {
        return Array1::zeros(raw.len());
    }

    raw.mapv(|s| (max - s) / spread)
}

/// Nearest-rank quantile of an unsorted sample, q in [0, 1]
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
