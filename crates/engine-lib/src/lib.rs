//! Engine library for multi-algorithm time series anomaly detection
//!
//! This crate provides the core functionality for:
//! - Metric collection from a Prometheus ingestion source
//! - Feature engineering over raw series
//! - Training statistical and unsupervised detection models
//! - Scoring recent windows and classifying anomaly severity
//! - Periodic orchestration of training and inference cycles

pub mod collector;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod inference;
pub mod models;
pub mod observability;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod trainer;

pub use config::EngineConfig;
pub use error::DetectError;
pub use models::*;
pub use observability::EngineMetrics;
