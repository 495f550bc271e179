//! Engine configuration model
//!
//! Every field carries a serde default so a partial (or absent) config file
//! still yields a runnable engine. Loading from file/environment lives in
//! the binary crate.

use serde::Deserialize;

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub anomaly_detection: AnomalyDetectionConfig,
    #[serde(default)]
    pub data_collection: DataCollectionConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub feature_engineering: FeatureEngineeringConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Prometheus base URL for the ingestion source
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,
    /// Base URL of the API hosting the model registry and anomaly sink
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Directory for locally persisted model artifacts
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

/// Detection thresholds and severity cut points
#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyDetectionConfig {
    /// Normalized score above which a point is flagged
    #[serde(default = "default_detection_threshold")]
    pub threshold: f64,
    /// Recognized for inference window sizing (minutes of recent data)
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    /// Recognized option; consecutive-run gating is not applied by this engine
    #[serde(default = "default_min_consecutive")]
    pub min_consecutive: u32,
    #[serde(default)]
    pub severity_levels: SeverityLevels,
}

impl Default for AnomalyDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_detection_threshold(),
            window_size: default_window_size(),
            min_consecutive: default_min_consecutive(),
            severity_levels: SeverityLevels::default(),
        }
    }
}

/// Monotonic severity cut points over the normalized score
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeverityLevels {
    #[serde(default = "default_severity_low")]
    pub low: f64,
    #[serde(default = "default_severity_medium")]
    pub medium: f64,
    #[serde(default = "default_severity_high")]
    pub high: f64,
    #[serde(default = "default_severity_critical")]
    pub critical: f64,
}

impl Default for SeverityLevels {
    fn default() -> Self {
        Self {
            low: default_severity_low(),
            medium: default_severity_medium(),
            high: default_severity_high(),
            critical: default_severity_critical(),
        }
    }
}

/// Which metrics to watch and how much history to train on
#[derive(Debug, Clone, Deserialize)]
pub struct DataCollectionConfig {
    #[serde(default)]
    pub metrics: Vec<MetricTarget>,
    /// Minimum training points per metric; below this the metric is skipped
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    /// Hours of history fetched for training
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
}

impl Default for DataCollectionConfig {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            min_data_points: default_min_data_points(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

/// One watched metric
#[derive(Debug, Clone, Deserialize)]
pub struct MetricTarget {
    pub name: String,
}

/// Per-family model configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub statistical: StatisticalModels,
    #[serde(default)]
    pub unsupervised: UnsupervisedModels,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatisticalModels {
    #[serde(default)]
    pub zscore: ZScoreConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UnsupervisedModels {
    #[serde(default)]
    pub isolation_forest: IsolationForestConfig,
    #[serde(default)]
    pub one_class_svm: OneClassSvmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZScoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Threshold multiplier in standard deviations
    #[serde(default = "default_zscore_threshold")]
    pub threshold: f64,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_zscore_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IsolationForestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Fixed seed so training is deterministic
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contamination: default_contamination(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            random_state: default_random_state(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneClassSvmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub kernel: KernelKind,
    #[serde(default)]
    pub gamma: GammaParam,
    #[serde(default = "default_nu")]
    pub nu: f64,
}

impl Default for OneClassSvmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kernel: KernelKind::default(),
            gamma: GammaParam::default(),
            nu: default_nu(),
        }
    }
}

/// Kernel function for the one-class estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    #[default]
    Rbf,
    Linear,
}

/// Gamma selection: a named policy or an explicit value
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum GammaParam {
    Preset(GammaPreset),
    Value(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaPreset {
    Scale,
    Auto,
}

impl Default for GammaParam {
    fn default() -> Self {
        GammaParam::Preset(GammaPreset::Auto)
    }
}

/// Rolling window sizes for feature engineering
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureEngineeringConfig {
    #[serde(default = "default_rolling_windows")]
    pub rolling_windows: Vec<usize>,
}

impl Default for FeatureEngineeringConfig {
    fn default() -> Self {
        Self {
            rolling_windows: default_rolling_windows(),
        }
    }
}

/// Control-loop cadence
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Full retraining interval (default daily)
    #[serde(default = "default_training_interval")]
    pub training_interval_secs: u64,
    /// Inference interval (default every 5 minutes)
    #[serde(default = "default_inference_interval")]
    pub inference_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            training_interval_secs: default_training_interval(),
            inference_interval_secs: default_inference_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_detection_threshold() -> f64 {
    0.7
}

fn default_window_size() -> u64 {
    60
}

fn default_min_consecutive() -> u32 {
    3
}

fn default_severity_low() -> f64 {
    0.7
}

fn default_severity_medium() -> f64 {
    0.85
}

fn default_severity_high() -> f64 {
    0.95
}

fn default_severity_critical() -> f64 {
    0.99
}

fn default_min_data_points() -> usize {
    1000
}

fn default_lookback_hours() -> u64 {
    168
}

fn default_zscore_threshold() -> f64 {
    3.0
}

fn default_contamination() -> f64 {
    0.1
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_random_state() -> u64 {
    42
}

fn default_nu() -> f64 {
    0.1
}

fn default_rolling_windows() -> Vec<usize> {
    vec![5, 10, 30]
}

fn default_training_interval() -> u64 {
    24 * 60 * 60
}

fn default_inference_interval() -> u64 {
    5 * 60
}

fn default_prometheus_url() -> String {
    "http://prometheus:9090".to_string()
}

fn default_api_url() -> String {
    "http://saimon-api:8000".to_string()
}

fn default_model_path() -> String {
    "/app/models".to_string()
}
