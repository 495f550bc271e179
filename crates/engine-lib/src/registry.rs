//! External model registry client
//!
//! Registration is best-effort: a registry failure is logged by the caller
//! and never invalidates the locally persisted artifact. Re-registration
//! creates a new entry under the same deterministic version tag.

use crate::detector::TrainedModel;
use crate::error::DetectError;
use crate::models::ModelKey;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ModelRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    model_id: Option<i64>,
}

impl ModelRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DetectError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DetectError::RegistryUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Register a trained artifact under the version tag `1.0-{algorithm}`.
    /// Not idempotent: the registry creates a new entry each call.
    pub async fn register(
        &self,
        key: &ModelKey,
        model: &TrainedModel,
        file_path: Option<&Path>,
    ) -> Result<Option<i64>, DetectError> {
        let payload = serde_json::json!({
            "name": key.metric,
            "version": format!("1.0-{}", key.algorithm),
            "model_type": key.algorithm,
            "config": model.registry_config(),
            "file_path": file_path.map(|p| p.display().to_string()),
            "is_active": true,
            "trained_at": chrono::Utc::now().to_rfc3339(),
        });

        let url = format!("{}/api/v1/models", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DetectError::RegistryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DetectError::RegistryUnavailable(format!(
                "registry returned HTTP {}",
                response.status()
            )));
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| DetectError::RegistryUnavailable(e.to_string()))?;

        debug!(key = %key, model_id = ?body.model_id, "Registered model");
        Ok(body.model_id)
    }
}
