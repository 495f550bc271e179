//! Time series collection from the ingestion source
//!
//! The engine consumes an ingestion source through the [`DataCollector`]
//! seam; the production implementation queries the Prometheus HTTP range
//! API. A fetch failure surfaces as an error the caller treats as "no data
//! for this cycle", never as a partially filled series.

mod prometheus;

pub use prometheus::PrometheusCollector;

use crate::models::MetricSeries;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for time-ranged metric fetches
#[async_trait]
pub trait DataCollector: Send + Sync {
    /// Fetch the series for `metric` between `start` and `end` (epoch
    /// seconds) at `step_secs` resolution. May return an empty series.
    async fn fetch(
        &self,
        metric: &str,
        start: i64,
        end: i64,
        step_secs: u64,
    ) -> Result<MetricSeries>;
}
