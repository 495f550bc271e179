//! External anomaly sink client
//!
//! Forwards flagged points to the alerting/storage API. Delivery is
//! best-effort with no retry: a failed record is logged by the caller and
//! dropped.

use crate::error::DetectError;
use crate::models::AnomalyRecord;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AnomalySink {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SinkResponse {
    #[serde(default)]
    anomaly_id: Option<i64>,
}

impl AnomalySink {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DetectError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DetectError::SinkUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Forward one record. The engine keeps no copy on failure.
    pub async fn emit(&self, record: &AnomalyRecord) -> Result<Option<i64>, DetectError> {
        let timestamp = chrono::DateTime::from_timestamp(record.timestamp, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| record.timestamp.to_string());

        let payload = serde_json::json!({
            "metric_name": record.metric_name,
            "timestamp": timestamp,
            "value": record.value,
            "expected_value": record.expected_value.unwrap_or(0.0),
            "anomaly_score": record.score,
            "severity": record.severity,
            "algorithm": record.algorithm,
            "labels": record.labels,
        });

        let url = format!("{}/api/v1/anomalies", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DetectError::SinkUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DetectError::SinkUnavailable(format!(
                "sink returned HTTP {}",
                response.status()
            )));
        }

        let body: SinkResponse = response
            .json()
            .await
            .map_err(|e| DetectError::SinkUnavailable(e.to_string()))?;

        debug!(
            metric = %record.metric_name,
            anomaly_id = ?body.anomaly_id,
            "Forwarded anomaly record"
        );
        Ok(body.anomaly_id)
    }
}
