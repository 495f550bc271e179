//! Inference pipeline and severity classification
//!
//! One inference cycle fetches the recent window for every watched metric,
//! rebuilds features with the training-time column layout, and scores the
//! window with every trained model for that metric. Points whose normalized
//! score strictly exceeds the detection threshold become anomaly records,
//! classified by severity and forwarded to the sink best-effort.

use crate::collector::DataCollector;
use crate::config::{AnomalyDetectionConfig, EngineConfig, MetricTarget, SeverityLevels};
use crate::error::DetectError;
use crate::features::FeatureBuilder;
use crate::models::{AnomalyRecord, Severity};
use crate::observability::EngineMetrics;
use crate::sink::AnomalySink;
use crate::store::ModelStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resolution of the inference fetch (one sample per minute)
const INFERENCE_STEP_SECS: u64 = 60;

/// Maps a normalized score onto a severity level.
///
/// Cut points are inclusive: a score equal to a cut takes that severity.
/// Every flagged score lands at or above the detection threshold, so `Low`
/// is the floor rather than "not anomalous".
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    levels: SeverityLevels,
}

impl SeverityClassifier {
    pub fn new(levels: SeverityLevels) -> Self {
        Self { levels }
    }

    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.levels.critical {
            Severity::Critical
        } else if score >= self.levels.high {
            Severity::High
        } else if score >= self.levels.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

pub struct InferencePipeline {
    collector: Arc<dyn DataCollector>,
    store: Arc<ModelStore>,
    sink: Option<Arc<AnomalySink>>,
    features: FeatureBuilder,
    detection: AnomalyDetectionConfig,
    targets: Vec<MetricTarget>,
    classifier: SeverityClassifier,
    metrics: EngineMetrics,
}

impl InferencePipeline {
    pub fn new(
        collector: Arc<dyn DataCollector>,
        store: Arc<ModelStore>,
        sink: Option<Arc<AnomalySink>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            collector,
            store,
            sink,
            features: FeatureBuilder::new(config.feature_engineering.rolling_windows.clone()),
            detection: config.anomaly_detection.clone(),
            targets: config.data_collection.metrics.clone(),
            classifier: SeverityClassifier::new(config.anomaly_detection.severity_levels),
            metrics: EngineMetrics::new(),
        }
    }

    /// Run one inference cycle over every watched metric, forwarding
    /// flagged records to the sink. Per-metric failures are logged and
    /// never abort the cycle.
    pub async fn run_all(&self) -> usize {
        let start = Instant::now();
        let mut emitted = 0;

        for target in &self.targets {
            match self.detect_metric(&target.name).await {
                Ok(records) => {
                    emitted += records.len();
                    self.forward(records).await;
                }
                Err(e) if e.is_data_gap() => {
                    debug!(metric = %target.name, reason = %e, "Skipping metric this cycle");
                }
                Err(e) => {
                    warn!(metric = %target.name, error = %e, "Inference failed for metric");
                }
            }
        }

        self.metrics.inc_inference_runs();
        self.metrics
            .observe_inference_duration(start.elapsed().as_secs_f64());

        info!(
            anomalies = emitted,
            duration_secs = start.elapsed().as_secs_f64(),
            "Inference cycle complete"
        );
        emitted
    }

    /// Score the recent window of one metric against every trained model.
    ///
    /// A point is flagged only when its normalized score strictly exceeds
    /// the detection threshold. The same point may yield one record per
    /// algorithm.
    pub async fn detect_metric(&self, metric: &str) -> Result<Vec<AnomalyRecord>, DetectError> {
        let now = chrono::Utc::now().timestamp();
        let start = now - self.detection.window_size as i64 * 60;

        let series = match self
            .collector
            .fetch(metric, start, now, INFERENCE_STEP_SECS)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(metric = %metric, error = %e, "Inference fetch failed");
                self.metrics.inc_fetch_errors();
                return Err(DetectError::DataUnavailable {
                    metric: metric.to_string(),
                });
            }
        };

        let features = match self.features.build(&series) {
            Some(features) => features,
            None => {
                return Err(DetectError::DataUnavailable {
                    metric: metric.to_string(),
                })
            }
        };

        let models = self.store.models_for_metric(metric).await;
        if models.is_empty() {
            debug!(metric = %metric, "No trained models, nothing to score");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for (algorithm, model) in models {
            let scoring = model.scoring();
            let raw = match scoring.raw_scores(&features) {
                Ok(raw) => raw,
                Err(e) => {
                    self.metrics.inc_fit_errors();
                    warn!(
                        metric = %metric,
                        algorithm = %algorithm,
                        error = %e,
                        "Scoring failed, skipping algorithm"
                    );
                    continue;
                }
            };
            let scores = scoring.normalize(&raw);

            for (i, point) in series.points.iter().enumerate() {
                if scores[i] > self.detection.threshold {
                    let severity = self.classifier.classify(scores[i]);
                    info!(
                        metric = %metric,
                        algorithm = %algorithm,
                        timestamp = point.timestamp,
                        value = point.value,
                        score = scores[i],
                        severity = %severity,
                        "Anomaly detected"
                    );
                    self.metrics
                        .inc_anomalies_emitted(metric, algorithm.as_str());
                    records.push(AnomalyRecord {
                        metric_name: metric.to_string(),
                        timestamp: point.timestamp,
                        value: point.value,
                        expected_value: scoring.expected_value(),
                        raw_score: raw[i],
                        score: scores[i],
                        severity,
                        algorithm,
                        detected_at: now,
                        labels: series.labels.clone(),
                    });
                }
            }
        }

        Ok(records)
    }

    /// Forward records to the sink, dropping any the sink rejects.
    async fn forward(&self, records: Vec<AnomalyRecord>) {
        let Some(sink) = &self.sink else {
            return;
        };
        for record in records {
            if let Err(e) = sink.emit(&record).await {
                self.metrics.inc_sink_errors();
                warn!(
                    metric = %record.metric_name,
                    timestamp = record.timestamp,
                    error = %e,
                    "Dropping anomaly record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::async_trait;
    use crate::detector::{TrainedModel, ZScoreModel};
    use crate::models::{Algorithm, DataPoint, MetricSeries, ModelKey};
    use anyhow::Result;

    struct StaticCollector {
        series: MetricSeries,
    }

    #[async_trait]
    impl DataCollector for StaticCollector {
        async fn fetch(&self, _: &str, _: i64, _: i64, _: u64) -> Result<MetricSeries> {
            Ok(self.series.clone())
        }
    }

    fn series_with_spike(metric: &str, baseline: usize, spike: f64) -> MetricSeries {
        let mut series = MetricSeries::new(metric);
        series.points = (0..baseline)
            .map(|i| DataPoint {
                timestamp: i as i64 * 60,
                value: 50.0,
            })
            .collect();
        series.points.push(DataPoint {
            timestamp: baseline as i64 * 60,
            value: spike,
        });
        series
    }

    fn pipeline_with(
        series: MetricSeries,
        store: Arc<ModelStore>,
        threshold: f64,
    ) -> InferencePipeline {
        let mut config: EngineConfig = serde_json::from_str("{}").unwrap();
        config.anomaly_detection.threshold = threshold;
        InferencePipeline::new(Arc::new(StaticCollector { series }), store, None, &config)
    }

    #[test]
    fn test_severity_cut_points_inclusive() {
        let classifier = SeverityClassifier::new(SeverityLevels::default());
        assert_eq!(classifier.classify(1.0), Severity::Critical);
        assert_eq!(classifier.classify(0.995), Severity::Critical);
        assert_eq!(classifier.classify(0.99), Severity::Critical);
        assert_eq!(classifier.classify(0.96), Severity::High);
        assert_eq!(classifier.classify(0.95), Severity::High);
        assert_eq!(classifier.classify(0.9), Severity::Medium);
        assert_eq!(classifier.classify(0.85), Severity::Medium);
        assert_eq!(classifier.classify(0.84), Severity::Low);
        assert_eq!(classifier.classify(0.5), Severity::Low);
    }

    #[tokio::test]
    async fn test_spike_flagged_with_expected_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        store
            .publish(
                ModelKey::new("cpu_usage", Algorithm::ZScore),
                TrainedModel::ZScore(ZScoreModel {
                    mean: 50.0,
                    std: 5.0,
                    threshold: 3.0,
                }),
            )
            .await;

        let series = series_with_spike("cpu_usage", 30, 150.0);
        let pipeline = pipeline_with(series, store, 0.7);

        let records = pipeline.detect_metric("cpu_usage").await.unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.value, 150.0);
        assert_eq!(record.expected_value, Some(50.0));
        assert_eq!(record.algorithm, Algorithm::ZScore);
        // z = 100 / 5 / 3 clips to 1.0
        assert_eq!(record.score, 1.0);
        assert_eq!(record.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_threshold_is_strictly_greater() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        store
            .publish(
                ModelKey::new("cpu_usage", Algorithm::ZScore),
                TrainedModel::ZScore(ZScoreModel {
                    mean: 50.0,
                    std: 5.0,
                    threshold: 3.0,
                }),
            )
            .await;

        // Scores clip at 1.0, so with the threshold at 1.0 nothing can
        // strictly exceed it
        let series = series_with_spike("cpu_usage", 30, 10_000.0);
        let pipeline = pipeline_with(series, store, 1.0);

        let records = pipeline.detect_metric("cpu_usage").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_scoring_failure_never_blocks_sibling_models() {
        use crate::config::IsolationForestConfig;
        use crate::detector::ForestModel;
        use ndarray::Array2;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));

        // Forest fitted on a two-column matrix; the pipeline's default
        // windows build seven columns, so its scaler rejects the batch
        let stale_features = Array2::from_shape_vec(
            (64, 2),
            (0..128).map(|i| (i % 13) as f64).collect(),
        )
        .unwrap();
        let forest =
            ForestModel::fit(&stale_features, &IsolationForestConfig::default()).unwrap();
        store
            .publish(
                ModelKey::new("cpu_usage", Algorithm::IsolationForest),
                TrainedModel::IsolationForest(forest),
            )
            .await;
        store
            .publish(
                ModelKey::new("cpu_usage", Algorithm::ZScore),
                TrainedModel::ZScore(ZScoreModel {
                    mean: 50.0,
                    std: 5.0,
                    threshold: 3.0,
                }),
            )
            .await;

        let series = series_with_spike("cpu_usage", 30, 150.0);
        let pipeline = pipeline_with(series, store, 0.7);

        let records = pipeline.detect_metric("cpu_usage").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].algorithm, Algorithm::ZScore);
    }

    #[tokio::test]
    async fn test_no_models_yields_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        let series = series_with_spike("cpu_usage", 30, 150.0);
        let pipeline = pipeline_with(series, store, 0.7);

        let records = pipeline.detect_metric("cpu_usage").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_empty_window_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        let pipeline = pipeline_with(MetricSeries::new("cpu_usage"), store, 0.7);

        let err = pipeline.detect_metric("cpu_usage").await.unwrap_err();
        assert!(matches!(err, DetectError::DataUnavailable { .. }));
    }
}
