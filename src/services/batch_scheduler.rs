//! Batch scheduler
//!
//! Runs one job per zone with at most `workers` jobs in flight.
//!
//! **MODES**
//! -- barrier: consecutive batches of `workers` zones, each joined before the next starts
//! -- pool: a semaphore-gated rolling pool; a finished zone frees its slot immediately
//!
//! Both modes stop launching after the first failure and re-raise it once the
//! in-flight work has been joined.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SchedulerConfig, SchedulingMode};

/// One batch of concurrently running zones.
///
/// In pool mode every zone is its own batch.
#[derive(Debug, Clone)]
pub struct BatchRecord {
    /// Launch order of the batch.
    pub index: usize,
    /// Zones run in the batch.
    pub zones: Vec<usize>,
    /// When the first job launched.
    pub started: Instant,
    /// When the last job finished.
    pub finished: Instant,
}

/// Every batch launched during one `run_all` call.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// Batches in launch order.
    pub batches: Vec<BatchRecord>,
}

impl ScheduleReport {
    /// Number of zones in each batch, in launch order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|batch| batch.zones.len()).collect()
    }
}

/// Runs one job per zone with at most `workers` in flight.
///
/// In barrier mode zones are cut into consecutive batches of `workers` and each
/// batch is joined before the next one starts. In pool mode a new zone starts as
/// soon as a slot frees up. Either way the first failure stops further launches
/// and is returned once running jobs have finished.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    workers: usize,
    mode: SchedulingMode,
}

impl BatchScheduler {
    /// A worker count of zero is treated as one.
    pub fn new(workers: usize, mode: SchedulingMode) -> Self {
        Self {
            workers: workers.max(1),
            mode,
        }
    }

    /// Scheduler built from the `scheduler` config section.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.workers, config.mode)
    }

    /// Concurrency limit.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Scheduling mode.
    pub const fn mode(&self) -> SchedulingMode {
        self.mode
    }

    /// Run `job` once for every zone in `zones`.
    pub async fn run_all<F, Fut>(&self, zones: &[usize], job: F) -> DomainResult<ScheduleReport>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = DomainResult<()>> + Send + 'static,
    {
        match self.mode {
            SchedulingMode::Barrier => self.run_barrier(zones, job).await,
            SchedulingMode::Pool => self.run_pool(zones, job).await,
        }
    }

    // ------------------------------------------------------------------------
    // Barrier mode
    // ------------------------------------------------------------------------

    async fn run_barrier<F, Fut>(&self, zones: &[usize], job: F) -> DomainResult<ScheduleReport>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = DomainResult<()>> + Send + 'static,
    {
        let mut report = ScheduleReport::default();

        for (index, batch) in zones.chunks(self.workers).enumerate() {
            tracing::debug!(batch = index, zones = ?batch, "launching batch");
            let started = Instant::now();
            let handles: Vec<_> = batch.iter().map(|&zone| tokio::spawn(job(zone))).collect();
            let results = join_all(handles).await;
            let finished = Instant::now();

            report.batches.push(BatchRecord {
                index,
                zones: batch.to_vec(),
                started,
                finished,
            });

            let mut first_error = None;
            for (zone, result) in batch.iter().zip(results) {
                let outcome = result.map_err(|e| {
                    DomainError::ExecutionFailed(format!("worker for zone {zone} panicked: {e}"))
                });
                if let Err(err) = outcome.and_then(|inner| inner) {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
            if let Some(err) = first_error {
                tracing::error!(batch = index, error = %err, "batch failed, not launching further batches");
                return Err(err);
            }
            tracing::debug!(
                batch = index,
                elapsed_ms = finished.duration_since(started).as_millis(),
                "batch finished"
            );
        }

        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Pool mode
    // ------------------------------------------------------------------------

    async fn run_pool<F, Fut>(&self, zones: &[usize], job: F) -> DomainResult<ScheduleReport>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = DomainResult<()>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks: JoinSet<(usize, Instant, Instant, DomainResult<()>)> = JoinSet::new();

        for &zone in zones {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DomainError::ExecutionFailed(format!("worker pool closed: {e}")))?;
            if failed.load(Ordering::SeqCst) {
                tracing::warn!(zone, "earlier zone failed, not launching");
                break;
            }

            let fut = job(zone);
            let failed = failed.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let result = fut.await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                drop(permit);
                (zone, started, Instant::now(), result)
            });
        }

        let mut report = ScheduleReport::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((zone, started, finished, result)) => {
                    report.batches.push(BatchRecord {
                        index: 0,
                        zones: vec![zone],
                        started,
                        finished,
                    });
                    if let Err(err) = result {
                        first_error.get_or_insert(err);
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(DomainError::ExecutionFailed(format!(
                        "worker panicked: {e}"
                    )));
                }
            }
        }

        if let Some(err) = first_error {
            tracing::error!(error = %err, "worker pool failed");
            return Err(err);
        }

        report.batches.sort_by_key(|batch| batch.started);
        for (index, batch) in report.batches.iter_mut().enumerate() {
            batch.index = index;
        }
        Ok(report)
    }
}
