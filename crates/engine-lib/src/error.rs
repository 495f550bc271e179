//! Error taxonomy for the detection engine
//!
//! Every variant here is non-fatal at the orchestrator level: per-metric
//! and per-algorithm operations are wrapped so one failure never cascades.

use crate::models::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    /// The ingestion source returned nothing (or failed) for a metric.
    /// The metric is skipped for this cycle.
    #[error("no data available for metric '{metric}'")]
    DataUnavailable { metric: String },

    /// The training window holds fewer points than the configured minimum.
    #[error("insufficient data for metric '{metric}': {points} points, need {required}")]
    InsufficientData {
        metric: String,
        points: usize,
        required: usize,
    },

    /// Fitting or scoring one algorithm failed. Sibling algorithms proceed.
    #[error("model fit failed for {algorithm} on metric '{metric}': {reason}")]
    ModelFitFailure {
        metric: String,
        algorithm: Algorithm,
        reason: String,
    },

    /// The external model registry rejected or never saw a registration.
    /// The locally persisted artifact remains valid.
    #[error("model registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The external anomaly sink rejected a record. The record is dropped.
    #[error("anomaly sink unavailable: {0}")]
    SinkUnavailable(String),
}

impl DetectError {
    /// True for skip-and-continue conditions that do not indicate a fault
    /// in the engine itself.
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            DetectError::DataUnavailable { .. } | DetectError::InsufficientData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DetectError::InsufficientData {
            metric: "cpu_usage".to_string(),
            points: 500,
            required: 1000,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for metric 'cpu_usage': 500 points, need 1000"
        );
        assert!(err.is_data_gap());

        let err = DetectError::ModelFitFailure {
            metric: "cpu_usage".to_string(),
            algorithm: Algorithm::OneClassSvm,
            reason: "empty feature matrix".to_string(),
        };
        assert!(!err.is_data_gap());
        assert!(err.to_string().contains("one_class_svm"));
    }
}
