//! Prometheus range-query collector

use super::{async_trait, DataCollector};
use crate::models::{DataPoint, MetricSeries};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Collector backed by the Prometheus HTTP API (`/api/v1/query_range`)
pub struct PrometheusCollector {
    client: reqwest::Client,
    base_url: String,
}

impl PrometheusCollector {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("building Prometheus HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DataCollector for PrometheusCollector {
    async fn fetch(
        &self,
        metric: &str,
        start: i64,
        end: i64,
        step_secs: u64,
    ) -> Result<MetricSeries> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", metric),
                ("start", &start.to_string()),
                ("end", &end.to_string()),
                ("step", &step_secs.to_string()),
            ])
            .send()
            .await
            .context("sending range query")?
            .error_for_status()
            .context("range query rejected")?;

        let body: QueryRangeResponse = response.json().await.context("decoding range query")?;
        let series = parse_query_range(metric, body)?;
        debug!(
            metric = %metric,
            points = series.len(),
            "Fetched series from Prometheus"
        );
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryRangeData>,
}

#[derive(Debug, Deserialize)]
struct QueryRangeData {
    #[serde(default)]
    result: Vec<RangeResult>,
}

#[derive(Debug, Deserialize)]
struct RangeResult {
    #[serde(default)]
    metric: HashMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Flatten a range-query response into one ordered series.
///
/// Multiple result streams are merged; the first stream's label set is
/// kept. Non-finite sample values are dropped, and the merged series is
/// re-sorted and deduplicated to uphold the strictly-increasing invariant.
fn parse_query_range(metric: &str, response: QueryRangeResponse) -> Result<MetricSeries> {
    if response.status != "success" {
        bail!("query_range returned status '{}'", response.status);
    }

    let mut series = MetricSeries::new(metric);
    let data = match response.data {
        Some(data) => data,
        None => return Ok(series),
    };

    for (i, stream) in data.result.into_iter().enumerate() {
        if i == 0 {
            series.labels = stream.metric;
        }
        for (timestamp, value) in stream.values {
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() => series.points.push(DataPoint {
                    timestamp: timestamp as i64,
                    value: v,
                }),
                Ok(_) => {}
                Err(e) => {
                    warn!(metric = %metric, error = %e, "Dropping unparsable sample value");
                }
            }
        }
    }

    series.normalize();
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(json: &str) -> QueryRangeResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_matrix_response() {
        let response = response_from(
            r#"{
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [{
                        "metric": {"__name__": "cpu_usage", "instance": "node1"},
                        "values": [[1700000000, "0.5"], [1700000060, "0.6"], [1700000120, "0.7"]]
                    }]
                }
            }"#,
        );
        let series = parse_query_range("cpu_usage", response).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].timestamp, 1700000000);
        assert_eq!(series.points[1].value, 0.6);
        assert_eq!(series.labels.get("instance").unwrap(), "node1");
    }

    #[test]
    fn test_parse_empty_result_is_no_data() {
        let response = response_from(
            r#"{"status": "success", "data": {"resultType": "matrix", "result": []}}"#,
        );
        let series = parse_query_range("cpu_usage", response).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_parse_error_status_rejected() {
        let response = response_from(r#"{"status": "error"}"#);
        assert!(parse_query_range("cpu_usage", response).is_err());
    }

    #[test]
    fn test_nan_samples_dropped() {
        let response = response_from(
            r#"{
                "status": "success",
                "data": {"result": [{
                    "metric": {},
                    "values": [[1700000000, "NaN"], [1700000060, "1.5"]]
                }]}
            }"#,
        );
        let series = parse_query_range("cpu_usage", response).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points[0].value, 1.5);
    }

    #[test]
    fn test_merged_streams_sorted_and_deduped() {
        let response = response_from(
            r#"{
                "status": "success",
                "data": {"result": [
                    {"metric": {"pod": "a"}, "values": [[1700000060, "2.0"], [1700000000, "1.0"]]},
                    {"metric": {"pod": "b"}, "values": [[1700000060, "9.0"], [1700000120, "3.0"]]}
                ]}
            }"#,
        );
        let series = parse_query_range("cpu_usage", response).unwrap();

        let timestamps: Vec<i64> = series.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![1700000000, 1700000060, 1700000120]);
        assert_eq!(series.labels.get("pod").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query_range")
            .match_query(mockito::Matcher::UrlEncoded(
                "query".into(),
                "cpu_usage".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{"resultType":"matrix","result":[
                    {"metric":{},"values":[[1700000000,"0.5"],[1700000060,"0.6"]]}
                ]}}"#,
            )
            .create_async()
            .await;

        let collector = PrometheusCollector::new(server.url()).unwrap();
        let series = collector
            .fetch("cpu_usage", 1700000000, 1700000120, 60)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_http_error_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query_range")
            .with_status(500)
            .create_async()
            .await;

        let collector = PrometheusCollector::new(server.url()).unwrap();
        let result = collector.fetch("cpu_usage", 0, 60, 60).await;
        assert!(result.is_err());
    }
}
