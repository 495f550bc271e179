//! Training pipeline
//!
//! One training cycle fetches the full lookback window for every watched
//! metric, builds features once, and fits every enabled algorithm
//! independently. Failures are isolated at two levels: a metric that
//! cannot produce data is skipped, and an algorithm that fails to fit
//! never blocks its siblings. Successfully fitted models are published to
//! the store and registered with the external registry best-effort.

use crate::collector::DataCollector;
use crate::config::{DataCollectionConfig, EngineConfig, ModelsConfig};
use crate::detector::{ForestModel, SvmModel, TrainedModel, ZScoreModel};
use crate::error::DetectError;
use crate::features::FeatureBuilder;
use crate::models::{Algorithm, ModelKey};
use crate::observability::EngineMetrics;
use crate::registry::ModelRegistryClient;
use crate::store::ModelStore;
use ndarray::Array2;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Resolution of the training fetch (one sample per minute)
const TRAINING_STEP_SECS: u64 = 60;

pub struct ModelTrainer {
    collector: Arc<dyn DataCollector>,
    store: Arc<ModelStore>,
    registry: Option<Arc<ModelRegistryClient>>,
    features: FeatureBuilder,
    collection: DataCollectionConfig,
    models: ModelsConfig,
    metrics: EngineMetrics,
}

impl ModelTrainer {
    pub fn new(
        collector: Arc<dyn DataCollector>,
        store: Arc<ModelStore>,
        registry: Option<Arc<ModelRegistryClient>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            collector,
            store,
            registry,
            features: FeatureBuilder::new(config.feature_engineering.rolling_windows.clone()),
            collection: config.data_collection.clone(),
            models: config.models.clone(),
            metrics: EngineMetrics::new(),
        }
    }

    /// Run one full training cycle over every watched metric.
    ///
    /// Returns the number of models trained this cycle. Per-metric failures
    /// are logged and never abort the cycle.
    pub async fn train_all(&self) -> usize {
        let start = Instant::now();
        let mut trained = 0;

        for target in &self.collection.metrics {
            match self.train_metric(&target.name).await {
                Ok(count) => {
                    info!(metric = %target.name, models = count, "Trained metric");
                    trained += count;
                }
                Err(e) if e.is_data_gap() => {
                    info!(metric = %target.name, reason = %e, "Skipping metric this cycle");
                }
                Err(e) => {
                    warn!(metric = %target.name, error = %e, "Training failed for metric");
                }
            }
        }

        self.metrics.inc_training_runs();
        self.metrics
            .observe_training_duration(start.elapsed().as_secs_f64());
        self.metrics.set_models_trained(self.store.len().await as i64);

        info!(
            models = trained,
            duration_secs = start.elapsed().as_secs_f64(),
            "Training cycle complete"
        );
        trained
    }

    /// Train every enabled algorithm for one metric.
    pub async fn train_metric(&self, metric: &str) -> Result<usize, DetectError> {
        let end = chrono::Utc::now().timestamp();
        let start = end - self.collection.lookback_hours as i64 * 3600;

        let series = match self
            .collector
            .fetch(metric, start, end, TRAINING_STEP_SECS)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(metric = %metric, error = %e, "Training fetch failed");
                self.metrics.inc_fetch_errors();
                return Err(DetectError::DataUnavailable {
                    metric: metric.to_string(),
                });
            }
        };

        if series.is_empty() {
            self.metrics.inc_fetch_errors();
            return Err(DetectError::DataUnavailable {
                metric: metric.to_string(),
            });
        }
        if series.len() < self.collection.min_data_points {
            return Err(DetectError::InsufficientData {
                metric: metric.to_string(),
                points: series.len(),
                required: self.collection.min_data_points,
            });
        }

        let features = self
            .features
            .build(&series)
            .ok_or_else(|| DetectError::DataUnavailable {
                metric: metric.to_string(),
            })?;

        let mut trained = 0;
        for &algorithm in Algorithm::ALL.iter() {
            if !self.is_enabled(algorithm) {
                continue;
            }
            match self.fit(algorithm, &features) {
                Ok(model) => {
                    self.publish_and_register(metric, algorithm, model).await;
                    trained += 1;
                }
                Err(e) => {
                    self.metrics.inc_fit_errors();
                    let err = DetectError::ModelFitFailure {
                        metric: metric.to_string(),
                        algorithm,
                        reason: e.to_string(),
                    };
                    warn!(metric = %metric, algorithm = %algorithm, error = %err, "Model fit failed");
                }
            }
        }

        Ok(trained)
    }

    fn is_enabled(&self, algorithm: Algorithm) -> bool {
        match algorithm {
            Algorithm::ZScore => self.models.statistical.zscore.enabled,
            Algorithm::IsolationForest => self.models.unsupervised.isolation_forest.enabled,
            Algorithm::OneClassSvm => self.models.unsupervised.one_class_svm.enabled,
        }
    }

    fn fit(&self, algorithm: Algorithm, features: &Array2<f64>) -> anyhow::Result<TrainedModel> {
        match algorithm {
            Algorithm::ZScore => {
                ZScoreModel::fit(features, self.models.statistical.zscore.threshold)
                    .map(TrainedModel::ZScore)
            }
            Algorithm::IsolationForest => {
                ForestModel::fit(features, &self.models.unsupervised.isolation_forest)
                    .map(TrainedModel::IsolationForest)
            }
            Algorithm::OneClassSvm => {
                SvmModel::fit(features, &self.models.unsupervised.one_class_svm)
                    .map(TrainedModel::OneClassSvm)
            }
        }
    }

    async fn publish_and_register(&self, metric: &str, algorithm: Algorithm, model: TrainedModel) {
        let key = ModelKey::new(metric, algorithm);
        let path = self.store.publish(key.clone(), model.clone()).await;

        if let Some(registry) = &self.registry {
            if let Err(e) = registry.register(&key, &model, path.as_deref()).await {
                // Registration never invalidates the published artifact
                warn!(key = %key, error = %e, "Model registration failed");
            }
        }
    }
}
