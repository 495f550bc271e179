//! Anomaly Engine - multi-algorithm time series anomaly detection
//!
//! This binary wires the collector, model store, trainer, inference
//! pipeline, and orchestrator together and runs the control loop until
//! SIGINT.

use anyhow::Result;
use engine_lib::collector::{DataCollector, PrometheusCollector};
use engine_lib::inference::InferencePipeline;
use engine_lib::observability::EngineMetrics;
use engine_lib::registry::ModelRegistryClient;
use engine_lib::scheduler::Orchestrator;
use engine_lib::sink::AnomalySink;
use engine_lib::store::ModelStore;
use engine_lib::trainer::ModelTrainer;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = ENGINE_VERSION, "Starting anomaly-engine");

    let config = config::load()?;
    info!(
        prometheus_url = %config.prometheus_url,
        api_url = %config.api_url,
        metrics = config.data_collection.metrics.len(),
        "Engine configured"
    );

    let metrics = EngineMetrics::new();

    let collector: Arc<dyn DataCollector> =
        Arc::new(PrometheusCollector::new(&config.prometheus_url)?);
    let store = Arc::new(ModelStore::new(&config.model_path));

    let restored = store.load_from_disk().await?;
    info!(models = restored, "Restored persisted model artifacts");
    metrics.set_models_trained(store.len().await as i64);

    let registry = Arc::new(ModelRegistryClient::new(&config.api_url)?);
    let sink = Arc::new(AnomalySink::new(&config.api_url)?);

    let trainer = Arc::new(ModelTrainer::new(
        Arc::clone(&collector),
        Arc::clone(&store),
        Some(registry),
        &config,
    ));
    let inference = Arc::new(InferencePipeline::new(
        collector,
        Arc::clone(&store),
        Some(sink),
        &config,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let orchestrator = Orchestrator::new(trainer, inference, &config.scheduler);
    let orchestrator_handle = tokio::spawn(orchestrator.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(());
    orchestrator_handle.await?;

    Ok(())
}
