//! Periodic orchestration of training and inference
//!
//! The orchestrator owns an explicit job table: one training job and one
//! inference job, each with its own interval and next-due time. On startup
//! it runs training and then inference once, so a fresh engine has models
//! and a first verdict before the first scheduled cycle. Jobs run
//! sequentially and reschedule from completion time, so a slow cycle never
//! queues up a backlog.

use crate::config::SchedulerConfig;
use crate::inference::InferencePipeline;
use crate::trainer::ModelTrainer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Training,
    Inference,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Training => f.write_str("training"),
            JobKind::Inference => f.write_str("inference"),
        }
    }
}

#[derive(Debug)]
struct ScheduledJob {
    kind: JobKind,
    interval: Duration,
    next_due: Instant,
}

/// Kinds due at `now`, in table order
fn due_kinds(jobs: &[ScheduledJob], now: Instant) -> Vec<JobKind> {
    jobs.iter()
        .filter(|job| now >= job.next_due)
        .map(|job| job.kind)
        .collect()
}

pub struct Orchestrator {
    trainer: Arc<ModelTrainer>,
    inference: Arc<InferencePipeline>,
    jobs: Vec<ScheduledJob>,
}

impl Orchestrator {
    pub fn new(
        trainer: Arc<ModelTrainer>,
        inference: Arc<InferencePipeline>,
        config: &SchedulerConfig,
    ) -> Self {
        let now = Instant::now();
        // Training sits first so a due-together pair refreshes models
        // before they are scored against
        let jobs = vec![
            ScheduledJob {
                kind: JobKind::Training,
                interval: Duration::from_secs(config.training_interval_secs),
                next_due: now,
            },
            ScheduledJob {
                kind: JobKind::Inference,
                interval: Duration::from_secs(config.inference_interval_secs),
                next_due: now,
            },
        ];
        Self {
            trainer,
            inference,
            jobs,
        }
    }

    /// Run the control loop until a shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            training_interval_secs = self.jobs[0].interval.as_secs(),
            inference_interval_secs = self.jobs[1].interval.as_secs(),
            "Starting orchestrator"
        );

        // Startup pass: train, then score once
        self.execute(JobKind::Training).await;
        self.execute(JobKind::Inference).await;
        let now = Instant::now();
        for job in &mut self.jobs {
            job.next_due = now + job.interval;
        }

        let mut ticker = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_due_jobs().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down orchestrator");
                    break;
                }
            }
        }
    }

    async fn run_due_jobs(&mut self) {
        for kind in due_kinds(&self.jobs, Instant::now()) {
            debug!(job = %kind, "Job due");
            self.execute(kind).await;
            if let Some(job) = self.jobs.iter_mut().find(|j| j.kind == kind) {
                job.next_due = Instant::now() + job.interval;
            }
        }
    }

    async fn execute(&self, kind: JobKind) {
        match kind {
            JobKind::Training => {
                self.trainer.train_all().await;
            }
            JobKind::Inference => {
                self.inference.run_all().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{async_trait, DataCollector};
    use crate::config::{EngineConfig, MetricTarget};
    use crate::models::{DataPoint, MetricSeries};
    use crate::store::ModelStore;
    use anyhow::Result;

    #[test]
    fn test_due_kinds_respects_table_order() {
        let now = Instant::now();
        let jobs = vec![
            ScheduledJob {
                kind: JobKind::Training,
                interval: Duration::from_secs(10),
                next_due: now,
            },
            ScheduledJob {
                kind: JobKind::Inference,
                interval: Duration::from_secs(5),
                next_due: now,
            },
        ];
        assert_eq!(
            due_kinds(&jobs, now),
            vec![JobKind::Training, JobKind::Inference]
        );
    }

    #[test]
    fn test_due_kinds_skips_future_jobs() {
        let now = Instant::now();
        let jobs = vec![
            ScheduledJob {
                kind: JobKind::Training,
                interval: Duration::from_secs(10),
                next_due: now + Duration::from_secs(60),
            },
            ScheduledJob {
                kind: JobKind::Inference,
                interval: Duration::from_secs(5),
                next_due: now,
            },
        ];
        assert_eq!(due_kinds(&jobs, now), vec![JobKind::Inference]);
    }

    struct StaticCollector {
        series: MetricSeries,
    }

    #[async_trait]
    impl DataCollector for StaticCollector {
        async fn fetch(&self, _: &str, _: i64, _: i64, _: u64) -> Result<MetricSeries> {
            Ok(self.series.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_pass_trains_before_first_tick() {
        let mut series = MetricSeries::new("cpu_usage");
        series.points = (0..200)
            .map(|i| DataPoint {
                timestamp: i as i64 * 60,
                value: 50.0 + (i % 10) as f64,
            })
            .collect();

        let mut config: EngineConfig = serde_json::from_str("{}").unwrap();
        config.data_collection.min_data_points = 100;
        config.data_collection.metrics = vec![MetricTarget {
            name: "cpu_usage".to_string(),
        }];

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        let collector = Arc::new(StaticCollector { series });

        let trainer = Arc::new(ModelTrainer::new(
            Arc::clone(&collector) as Arc<dyn DataCollector>,
            Arc::clone(&store),
            None,
            &config,
        ));
        let inference = Arc::new(InferencePipeline::new(
            collector,
            Arc::clone(&store),
            None,
            &config,
        ));

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let orchestrator = Orchestrator::new(trainer, inference, &config.scheduler);
        let handle = tokio::spawn(orchestrator.run(shutdown_rx));

        // Let the startup pass complete, then stop the loop
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // Defaults enable z-score and isolation forest
        assert_eq!(store.len().await, 2);
    }
}
