//! One-class kernel detection
//!
//! Kernel-based estimator that bounds a region of normal feature space: the
//! decision score of a point is its mean kernel similarity to a retained
//! support set, offset by `rho`, the nu-quantile of training similarities.
//! Roughly a `nu` fraction of training points fall outside the boundary,
//! and lower scores mean more anomalous points.

use super::{invert_min_max, quantile, ScoringModel, StandardScaler};
use crate::config::{GammaParam, GammaPreset, KernelKind, OneClassSvmConfig};
use crate::models::Algorithm;
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Cap on retained support rows, for inference cost
const MAX_SUPPORT: usize = 512;

/// Fitted one-class kernel model with its own feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModel {
    /// Scaled training rows retained as the support set
    support: Vec<Vec<f64>>,
    /// Decision offset at the nu-quantile of training similarities
    rho: f64,
    gamma: f64,
    kernel: KernelKind,
    nu: f64,
    scaler: StandardScaler,
}

impl SvmModel {
    pub fn fit(features: &Array2<f64>, config: &OneClassSvmConfig) -> Result<Self> {
        if features.nrows() < 2 {
            bail!(
                "one-class SVM needs at least 2 training rows, got {}",
                features.nrows()
            );
        }
        if !(0.0 < config.nu && config.nu <= 1.0) {
            bail!("nu must be in (0, 1], got {}", config.nu);
        }

        let (scaler, scaled) = StandardScaler::fit_transform(features)?;
        let gamma = resolve_gamma(config.gamma, &scaled)?;

        // Evenly strided subsample keeps fitting deterministic
        let n = scaled.nrows();
        let stride = n.div_ceil(MAX_SUPPORT).max(1);
        let support: Vec<Vec<f64>> = (0..n)
            .step_by(stride)
            .map(|r| scaled.row(r).to_vec())
            .collect();

        let mut model = Self {
            support,
            rho: 0.0,
            gamma,
            kernel: config.kernel,
            nu: config.nu,
            scaler,
        };

        let similarities: Vec<f64> = (0..n)
            .map(|r| model.mean_similarity(scaled.row(r)))
            .collect();
        model.rho = quantile(&similarities, config.nu);

        Ok(model)
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    fn mean_similarity(&self, row: ArrayView1<f64>) -> f64 {
        let sum: f64 = self
            .support
            .iter()
            .map(|sv| kernel_value(self.kernel, self.gamma, row, sv))
            .sum();
        sum / self.support.len() as f64
    }
}

impl ScoringModel for SvmModel {
    fn algorithm(&self) -> Algorithm {
        Algorithm::OneClassSvm
    }

    fn raw_scores(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(features)?;
        Ok(Array1::from_iter(
            (0..scaled.nrows()).map(|r| self.mean_similarity(scaled.row(r)) - self.rho),
        ))
    }

    fn normalize(&self, raw: &Array1<f64>) -> Array1<f64> {
        invert_min_max(raw)
    }
}

fn kernel_value(kernel: KernelKind, gamma: f64, a: ArrayView1<f64>, b: &[f64]) -> f64 {
    match kernel {
        KernelKind::Rbf => {
            let sq_dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
            (-gamma * sq_dist).exp()
        }
        KernelKind::Linear => a.iter().zip(b).map(|(x, y)| x * y).sum(),
    }
}

fn resolve_gamma(param: GammaParam, scaled: &Array2<f64>) -> Result<f64> {
    let d = scaled.ncols().max(1) as f64;
    match param {
        GammaParam::Preset(GammaPreset::Auto) => Ok(1.0 / d),
        GammaParam::Preset(GammaPreset::Scale) => {
            let n = (scaled.nrows() * scaled.ncols()).max(1) as f64;
            let mean = scaled.sum() / n;
            let var = scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Ok(1.0 / (d * var.max(f64::EPSILON)))
        }
        GammaParam::Value(g) if g > 0.0 => Ok(g),
        GammaParam::Value(g) => bail!("gamma must be positive, got {}", g),
    }
}
