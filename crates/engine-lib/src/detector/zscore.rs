//! Z-score detection over the raw-value column
//!
//! Fits a mean and standard deviation on the training window and scores a
//! point by how many threshold-multiples it deviates from the mean.

use super::{ScoringModel, SCORE_EPSILON};
use crate::models::Algorithm;
use anyhow::{bail, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScoreModel {
    pub mean: f64,
    pub std: f64,
    /// Threshold multiplier in standard deviations
    pub threshold: f64,
}

impl ZScoreModel {
    /// Fit mean and standard deviation of the raw-value column
    pub fn fit(features: &Array2<f64>, threshold: f64) -> Result<Self> {
        if features.nrows() == 0 {
            bail!("cannot fit z-score model on an empty feature matrix");
        }

        let values = features.column(0);
        let n = values.len() as f64;
        let mean = values.sum() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        Ok(Self { mean, std, threshold })
    }
}

impl ScoringModel for ZScoreModel {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ZScore
    }

    fn raw_scores(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if features.ncols() == 0 {
            bail!("feature matrix has no raw-value column");
        }
        Ok(features
            .column(0)
            .mapv(|v| (v - self.mean).abs() / (self.std + SCORE_EPSILON)))
    }

    /// Raw z-scores divided by the threshold, clipped to [0, 1]. A point at
    /// exactly `threshold` standard deviations normalizes to 1.0.
    fn normalize(&self, raw: &Array1<f64>) -> Array1<f64> {
        raw.mapv(|z| (z / self.threshold).clamp(0.0, 1.0))
    }

    fn expected_value(&self) -> Option<f64> {
        Some(self.mean)
    }
}
