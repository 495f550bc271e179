//! Feature engineering for detection models
//!
//! Turns a raw metric series into an aligned feature matrix: the raw value
//! column followed by rolling mean and rolling standard deviation for each
//! configured window. Rolling statistics use minimum-period-1 semantics, so
//! every row has a value even before a full window has accumulated. The
//! column layout depends only on the configured windows, which keeps
//! training and inference matrices dimensionally identical.

use crate::models::MetricSeries;
use ndarray::{Array1, Array2};

/// Builds feature matrices from raw series
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    rolling_windows: Vec<usize>,
}

impl FeatureBuilder {
    pub fn new(rolling_windows: Vec<usize>) -> Self {
        // A zero-length window would make the rolling slice empty
        let rolling_windows = rolling_windows.into_iter().filter(|w| *w > 0).collect();
        Self { rolling_windows }
    }

    /// Number of columns in every matrix this builder produces
    pub fn feature_count(&self) -> usize {
        1 + 2 * self.rolling_windows.len()
    }

    /// Build the feature matrix for a series.
    ///
    /// Returns `None` for an empty series: no data is a skip condition,
    /// not an error.
    pub fn build(&self, series: &MetricSeries) -> Option<Array2<f64>> {
        if series.is_empty() {
            return None;
        }

        let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
        let n = values.len();

        let mut matrix = Array2::<f64>::zeros((n, self.feature_count()));
        matrix.column_mut(0).assign(&Array1::from(values.clone()));

        for (i, &window) in self.rolling_windows.iter().enumerate() {
            let (means, stds) = rolling_stats(&values, window);
            matrix.column_mut(1 + 2 * i).assign(&Array1::from(means));
            matrix.column_mut(2 + 2 * i).assign(&Array1::from(stds));
        }

        Some(matrix)
    }
}

/// Rolling mean and sample standard deviation over a trailing window.
///
/// Minimum-period 1: row `i` uses the `min(i + 1, window)` most recent
/// points. Standard deviation is 0 when fewer than 2 samples exist.
fn rolling_stats(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut means = Vec::with_capacity(n);
    let mut stds = Vec::with_capacity(n);

    for i in 0..n {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        let count = slice.len() as f64;

        let mean = slice.iter().sum::<f64>() / count;
        means.push(mean);

        if slice.len() < 2 {
            stds.push(0.0);
        } else {
            let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
            stds.push(var.sqrt());
        }
    }

    (means, stds)
}
