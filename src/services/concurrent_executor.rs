//! Concurrent executor: runs K workers of one task in parallel.
//!
//! Every worker holds a permit from a process-wide semaphore while it runs,
//! so the total number of running workers is bounded across all in-flight
//! workflows. Failures of any kind come back as data in [`WorkerResult`].

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

use crate::domain::models::{Task, WorkerError, WorkerId, WorkerResult};
use crate::domain::ports::WorkerExecution;

/// Bounded worker pool shared by every workflow that holds a clone.
#[derive(Clone)]
pub struct ConcurrentExecutor {
    semaphore: Arc<Semaphore>,
}

impl ConcurrentExecutor {
    /// Executor with its own global pool of `max_concurrent_workers` permits.
    pub fn new(max_concurrent_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_workers.max(1))),
        }
    }

    /// Executor sharing an existing permit pool.
    pub fn with_semaphore(semaphore: Arc<Semaphore>) -> Self {
        Self { semaphore }
    }

    /// Permits not currently held by a running worker.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Stop admitting workers. Workers waiting for a permit are rejected.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Run `worker_count` workers on the task and wait for all of them.
    ///
    /// Results are ordered by worker id. Never fails: timeouts, errors,
    /// panics and rejections are recorded on the corresponding result.
    /// Each result's `duration_ms` covers only that worker's own run.
    pub async fn execute(
        &self,
        task: &Task,
        worker: Arc<dyn WorkerExecution>,
        worker_count: u32,
        worker_timeout: Duration,
    ) -> Vec<WorkerResult> {
        let task = Arc::new(task.clone());
        let mut launched = Vec::with_capacity(worker_count as usize);

        for worker_id in 0..worker_count {
            let semaphore = self.semaphore.clone();
            let worker = worker.clone();
            let task = task.clone();
            let launched_at = Utc::now();
            let clock = Instant::now();

            let handle = tokio::spawn(async move {
                run_worker(semaphore, worker, task, worker_id, worker_timeout).await
            });
            launched.push((worker_id, launched_at, clock, handle));
        }

        tracing::debug!(
            task_id = %task.id,
            worker = worker.name(),
            worker_count,
            "launched workers"
        );

        let (meta, handles): (Vec<_>, Vec<_>) = launched
            .into_iter()
            .map(|(id, launched_at, clock, handle)| ((id, launched_at, clock), handle))
            .unzip();
        let joined = join_all(handles).await;

        let mut results: Vec<WorkerResult> = meta
            .into_iter()
            .zip(joined)
            .map(|((worker_id, launched_at, clock), joined)| match joined {
                Ok(WorkerRun {
                    outcome: Ok(output),
                    started_at,
                    duration_ms,
                }) => WorkerResult::success(worker_id, task.id, output, duration_ms, started_at),
                Ok(WorkerRun {
                    outcome: Err(error),
                    started_at,
                    duration_ms,
                }) => {
                    tracing::warn!(
                        task_id = %task.id,
                        worker_id,
                        error = %error,
                        duration_ms,
                        "worker failed"
                    );
                    WorkerResult::failure(worker_id, task.id, error, duration_ms, started_at)
                }
                Err(join_error) => {
                    // A panicked task never reports its own timing.
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        "worker task was cancelled".to_string()
                    };
                    tracing::error!(
                        task_id = %task.id,
                        worker_id,
                        message = %message,
                        "worker panicked"
                    );
                    WorkerResult::failure(
                        worker_id,
                        task.id,
                        WorkerError::Panicked { message },
                        elapsed_ms(clock),
                        launched_at,
                    )
                }
            })
            .collect();

        results.sort_by_key(|r| r.worker_id);
        results
    }
}

/// What one spawned worker reports back, timed from the moment it got a permit.
struct WorkerRun {
    outcome: Result<String, WorkerError>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

async fn run_worker(
    semaphore: Arc<Semaphore>,
    worker: Arc<dyn WorkerExecution>,
    task: Arc<Task>,
    worker_id: WorkerId,
    worker_timeout: Duration,
) -> WorkerRun {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return WorkerRun {
            outcome: Err(WorkerError::Rejected {
                message: "worker pool is closed".to_string(),
            }),
            started_at: Utc::now(),
            duration_ms: 0,
        };
    };

    let started_at = Utc::now();
    let clock = Instant::now();
    let outcome = match timeout(worker_timeout, worker.run(&task, worker_id)).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(error)) => Err(WorkerError::Failed {
            message: format!("{error:#}"),
        }),
        Err(_) => Err(WorkerError::Timeout {
            after_ms: u64::try_from(worker_timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    };

    WorkerRun {
        outcome,
        started_at,
        duration_ms: elapsed_ms(clock),
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "worker panicked".to_string())
}
