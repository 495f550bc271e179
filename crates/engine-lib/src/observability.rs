//! Observability infrastructure for the detection engine
//!
//! Provides Prometheus metrics for the training and inference loops:
//! cycle counts, cycle latency, anomalies emitted, and the non-fatal
//! error counters that make skip-and-continue behavior visible.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for cycle latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    training_runs: IntCounter,
    inference_runs: IntCounter,
    training_duration_seconds: Histogram,
    inference_duration_seconds: Histogram,
    anomalies_emitted: IntCounterVec,
    fetch_errors: IntCounter,
    fit_errors: IntCounter,
    sink_errors: IntCounter,
    models_trained: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            training_runs: register_int_counter!(
                "anomaly_engine_training_runs_total",
                "Total number of completed training cycles"
            )
            .expect("Failed to register training_runs_total"),

            inference_runs: register_int_counter!(
                "anomaly_engine_inference_runs_total",
                "Total number of completed inference cycles"
            )
            .expect("Failed to register inference_runs_total"),

            training_duration_seconds: register_histogram!(
                "anomaly_engine_training_duration_seconds",
                "Wall-clock duration of a training cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            inference_duration_seconds: register_histogram!(
                "anomaly_engine_inference_duration_seconds",
                "Wall-clock duration of an inference cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_duration_seconds"),

            anomalies_emitted: register_int_counter_vec!(
                "anomaly_engine_anomalies_emitted_total",
                "Anomaly records emitted, by metric and algorithm",
                &["metric", "algorithm"]
            )
            .expect("Failed to register anomalies_emitted_total"),

            fetch_errors: register_int_counter!(
                "anomaly_engine_fetch_errors_total",
                "Failed or empty fetches from the ingestion source"
            )
            .expect("Failed to register fetch_errors_total"),

            fit_errors: register_int_counter!(
                "anomaly_engine_fit_errors_total",
                "Per-algorithm model fit failures"
            )
            .expect("Failed to register fit_errors_total"),

            sink_errors: register_int_counter!(
                "anomaly_engine_sink_errors_total",
                "Anomaly records dropped because the sink rejected them"
            )
            .expect("Failed to register sink_errors_total"),

            models_trained: register_int_gauge!(
                "anomaly_engine_models_trained",
                "Number of trained models currently held in the store"
            )
            .expect("Failed to register models_trained"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Multiple clones
/// share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs.inc();
    }

    pub fn inc_inference_runs(&self) {
        self.inner().inference_runs.inc();
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn observe_inference_duration(&self, duration_secs: f64) {
        self.inner().inference_duration_seconds.observe(duration_secs);
    }

    pub fn inc_anomalies_emitted(&self, metric: &str, algorithm: &str) {
        self.inner()
            .anomalies_emitted
            .with_label_values(&[metric, algorithm])
            .inc();
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    pub fn inc_fit_errors(&self) {
        self.inner().fit_errors.inc();
    }

    pub fn inc_sink_errors(&self) {
        self.inner().sink_errors.inc();
    }

    pub fn set_models_trained(&self, count: i64) {
        self.inner().models_trained.set(count);
    }
}
