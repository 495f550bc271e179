//! Trained model store
//!
//! An explicit owned table from `(metric, algorithm)` to the trained
//! artifact, shared by handle between the trainer (writer) and the
//! inference engine (reader). Publication swaps the whole `Arc`, so a
//! reader never observes a partially trained model. Artifacts are mirrored
//! to disk best-effort and reloaded at startup.

use crate::detector::TrainedModel;
use crate::models::{Algorithm, ModelKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// On-disk form of one artifact. The key travels inside the payload, so
/// nothing is ever recovered by parsing file names.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedArtifact {
    key: ModelKey,
    model: TrainedModel,
}

pub struct ModelStore {
    models: RwLock<HashMap<ModelKey, Arc<TrainedModel>>>,
    model_path: PathBuf,
}

impl ModelStore {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            model_path: model_path.into(),
        }
    }

    /// Publish a freshly trained artifact, replacing any previous one for
    /// the same key. Returns the path of the persisted file when the disk
    /// mirror succeeded.
    pub async fn publish(&self, key: ModelKey, model: TrainedModel) -> Option<PathBuf> {
        let model = Arc::new(model);

        let persisted = match self.persist(&key, &model) {
            Ok(path) => Some(path),
            Err(e) => {
                // The in-memory artifact is still authoritative
                warn!(key = %key, error = %e, "Failed to persist model artifact to disk");
                None
            }
        };

        let mut models = self.models.write().await;
        models.insert(key, model);
        persisted
    }

    pub async fn get(&self, key: &ModelKey) -> Option<Arc<TrainedModel>> {
        self.models.read().await.get(key).cloned()
    }

    /// All trained models for a metric, in stable algorithm order
    pub async fn models_for_metric(&self, metric: &str) -> Vec<(Algorithm, Arc<TrainedModel>)> {
        let models = self.models.read().await;
        Algorithm::ALL
            .iter()
            .filter_map(|&algorithm| {
                models
                    .get(&ModelKey::new(metric, algorithm))
                    .map(|m| (algorithm, Arc::clone(m)))
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }

    /// Reload previously persisted artifacts. Unreadable files are skipped
    /// with a warning; a missing directory simply yields zero models.
    pub async fn load_from_disk(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.model_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).context("reading model directory"),
        };

        let mut loaded = 0;
        let mut models = self.models.write().await;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path)
                .context("reading artifact")
                .and_then(|bytes| {
                    serde_json::from_slice::<PersistedArtifact>(&bytes)
                        .context("deserializing artifact")
                }) {
                Ok(artifact) => {
                    debug!(key = %artifact.key, path = %path.display(), "Loaded model artifact");
                    models.insert(artifact.key, Arc::new(artifact.model));
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable model artifact");
                }
            }
        }
        Ok(loaded)
    }

    fn persist(&self, key: &ModelKey, model: &TrainedModel) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.model_path).context("creating model directory")?;

        let file_name = format!(
            "{}_{}.json",
            key.metric.replace(['/', ' '], "_"),
            key.algorithm
        );
        let path = self.model_path.join(file_name);

        let artifact = PersistedArtifact {
            key: key.clone(),
            model: model.clone(),
        };
        let bytes = serde_json::to_vec(&artifact).context("serializing artifact")?;
        std::fs::write(&path, bytes).context("writing artifact")?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ZScoreModel;

    fn zscore_model(mean: f64) -> TrainedModel {
        TrainedModel::ZScore(ZScoreModel {
            mean,
            std: 1.0,
            threshold: 3.0,
        })
    }

    #[tokio::test]
    async fn test_publish_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let key = ModelKey::new("cpu_usage", Algorithm::ZScore);
        store.publish(key.clone(), zscore_model(50.0)).await;

        let model = store.get(&key).await.unwrap();
        assert_eq!(model.algorithm(), Algorithm::ZScore);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let key = ModelKey::new("cpu_usage", Algorithm::ZScore);

        store.publish(key.clone(), zscore_model(1.0)).await;
        store.publish(key.clone(), zscore_model(2.0)).await;

        assert_eq!(store.len().await, 1);
        match store.get(&key).await.unwrap().as_ref() {
            TrainedModel::ZScore(m) => assert_eq!(m.mean, 2.0),
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_models_for_metric_keyed_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        store
            .publish(ModelKey::new("cpu_usage", Algorithm::ZScore), zscore_model(1.0))
            .await;
        store
            .publish(ModelKey::new("mem_usage", Algorithm::ZScore), zscore_model(2.0))
            .await;

        let cpu = store.models_for_metric("cpu_usage").await;
        assert_eq!(cpu.len(), 1);
        assert_eq!(cpu[0].0, Algorithm::ZScore);
        assert!(store.models_for_metric("disk_io").await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ModelStore::new(dir.path());
            store
                .publish(ModelKey::new("cpu_usage", Algorithm::ZScore), zscore_model(60.0))
                .await;
        }

        let reloaded = ModelStore::new(dir.path());
        let count = reloaded.load_from_disk().await.unwrap();
        assert_eq!(count, 1);

        let key = ModelKey::new("cpu_usage", Algorithm::ZScore);
        match reloaded.get(&key).await.unwrap().as_ref() {
            TrainedModel::ZScore(m) => assert_eq!(m.mean, 60.0),
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_directory_loads_nothing() {
        let store = ModelStore::new("/nonexistent/model/dir");
        assert_eq!(store.load_from_disk().await.unwrap(), 0);
        assert!(store.is_empty().await);
    }
}
