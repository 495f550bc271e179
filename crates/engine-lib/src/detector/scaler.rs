//! Feature scaling for the unsupervised model families

use anyhow::{bail, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaler fitted per feature column
///
/// Each unsupervised model owns its own fitted instance so retraining one
/// model never disturbs another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations on a training matrix
    pub fn fit(features: &Array2<f64>) -> Result<Self> {
        if features.nrows() == 0 {
            bail!("cannot fit scaler on an empty feature matrix");
        }

        let n = features.nrows() as f64;
        let mut mean = Vec::with_capacity(features.ncols());
        let mut std = Vec::with_capacity(features.ncols());

        for col in features.columns() {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            // Constant columns pass through unscaled
            std.push(if s > f64::EPSILON { s } else { 1.0 });
        }

        Ok(Self { mean, std })
    }

    pub fn fit_transform(features: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(features)?;
        let scaled = scaler.transform(features)?;
        Ok((scaler, scaled))
    }

    /// Apply the fitted scaling. Fails on a column-count mismatch, which
    /// indicates the feature configuration changed since training.
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.mean.len() {
            bail!(
                "feature dimension mismatch: matrix has {} columns, scaler was fitted on {}",
                features.ncols(),
                self.mean.len()
            );
        }

        let mut scaled = features.clone();
        for (c, mut col) in scaled.columns_mut().into_iter().enumerate() {
            col.mapv_inplace(|v| (v - self.mean[c]) / self.std[c]);
        }
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let (_, scaled) = StandardScaler::fit_transform(&x).unwrap();

        for col in scaled.columns() {
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_not_divided_by_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let (_, scaled) = StandardScaler::fit_transform(&x).unwrap();
        assert!(scaled.column(0).iter().all(|v| v.is_finite()));
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let wrong = array![[1.0], [2.0]];
        assert!(scaler.transform(&wrong).is_err());
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&x).is_err());
    }
}
