//! Core data models for the anomaly detection engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single observation of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Epoch seconds
    pub timestamp: i64,
    pub value: f64,
}

/// An ordered time series for one metric, as returned by the ingestion source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: String,
    /// Points with strictly increasing timestamps, no duplicates within one fetch
    pub points: Vec<DataPoint>,
    /// Label set attached by the ingestion source
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl MetricSeries {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            points: Vec::new(),
            labels: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sort by timestamp and drop duplicate timestamps, keeping the first
    /// occurrence. Upholds the strictly-increasing invariant after a fetch
    /// that merged several result streams.
    pub fn normalize(&mut self) {
        self.points.sort_by_key(|p| p.timestamp);
        self.points.dedup_by_key(|p| p.timestamp);
    }
}

/// Detection algorithm families supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Wire identifier is `zscore`, not the snake_case `z_score`
    #[serde(rename = "zscore")]
    ZScore,
    IsolationForest,
    OneClassSvm,
}

impl Algorithm {
    /// All algorithm families, in training order
    pub const ALL: [Algorithm; 3] = [
        Algorithm::ZScore,
        Algorithm::IsolationForest,
        Algorithm::OneClassSvm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ZScore => "zscore",
            Algorithm::IsolationForest => "isolation_forest",
            Algorithm::OneClassSvm => "one_class_svm",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key identifying one trained model in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub metric: String,
    pub algorithm: Algorithm,
}

impl ModelKey {
    pub fn new(metric: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            metric: metric.into(),
            algorithm,
        }
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.metric, self.algorithm)
    }
}

/// Ordinal severity derived from a normalized anomaly score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged point, packaged for the external anomaly sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub metric_name: String,
    /// Epoch seconds of the observation that was flagged
    pub timestamp: i64,
    pub value: f64,
    /// Expected value where the model has a notion of one (z-score mean)
    pub expected_value: Option<f64>,
    /// Algorithm-specific raw score
    pub raw_score: f64,
    /// Normalized score in [0, 1], higher = more anomalous
    pub score: f64,
    pub severity: Severity,
    pub algorithm: Algorithm,
    /// Epoch seconds when the engine flagged the point
    pub detected_at: i64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}
