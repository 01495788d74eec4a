//! Worker execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one worker within a single dispatch, assigned at launch (0..K-1).
pub type WorkerId = u32;

/// Why a single worker did not produce an output.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerError {
    /// The worker did not finish within its timeout and was cancelled.
    #[error("worker timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The worker returned an error.
    #[error("worker failed: {message}")]
    Failed { message: String },

    /// The worker's task panicked or was aborted.
    #[error("worker panicked: {message}")]
    Panicked { message: String },

    /// The worker could not obtain an execution slot.
    #[error("worker rejected: {message}")]
    Rejected { message: String },
}

impl WorkerError {
    /// Whether the worker was cut off by the timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Output of one concurrent execution of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: WorkerId,
    pub task_id: Uuid,
    pub output: String,
    pub succeeded: bool,
    pub error: Option<WorkerError>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl WorkerResult {
    /// Result of a worker that produced `output`.
    pub fn success(
        worker_id: WorkerId,
        task_id: Uuid,
        output: impl Into<String>,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            worker_id,
            task_id,
            output: output.into(),
            succeeded: true,
            error: None,
            duration_ms,
            started_at,
        }
    }

    /// Result of a worker that failed with `error`.
    pub fn failure(
        worker_id: WorkerId,
        task_id: Uuid,
        error: WorkerError,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            worker_id,
            task_id,
            output: String::new(),
            succeeded: false,
            error: Some(error),
            duration_ms,
            started_at,
        }
    }
}

/// True when no worker in the collection succeeded (including an empty collection).
pub fn all_failed(results: &[WorkerResult]) -> bool {
    results.iter().all(|r| !r.succeeded)
}

/// Summarize worker errors as `worker N: reason` lines, ordered by worker id.
pub fn describe_failures(results: &[WorkerResult]) -> String {
    let mut failed: Vec<&WorkerResult> = results.iter().filter(|r| !r.succeeded).collect();
    failed.sort_by_key(|r| r.worker_id);
    failed
        .iter()
        .map(|r| {
            let reason = r
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            format!("worker {}: {}", r.worker_id, reason)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed() {
        let task_id = Uuid::new_v4();
        let now = Utc::now();
        let results = vec![
            WorkerResult::failure(0, task_id, WorkerError::Timeout { after_ms: 50 }, 50, now),
            WorkerResult::failure(
                1,
                task_id,
                WorkerError::Failed { message: "boom".into() },
                3,
                now,
            ),
        ];
        assert!(all_failed(&results));
        assert!(all_failed(&[]));

        let mut mixed = results.clone();
        mixed.push(WorkerResult::success(2, task_id, "ok", 5, now));
        assert!(!all_failed(&mixed));
    }

    #[test]
    fn test_describe_failures_is_ordered() {
        let task_id = Uuid::new_v4();
        let now = Utc::now();
        let results = vec![
            WorkerResult::failure(2, task_id, WorkerError::Timeout { after_ms: 10 }, 10, now),
            WorkerResult::failure(
                0,
                task_id,
                WorkerError::Failed { message: "bad input".into() },
                1,
                now,
            ),
        ];
        assert_eq!(
            describe_failures(&results),
            "worker 0: worker failed: bad input; worker 2: worker timed out after 10ms"
        );
    }

    #[test]
    fn test_worker_error_serde() {
        let err = WorkerError::Timeout { after_ms: 250 };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","after_ms":250}"#);
        assert!(err.is_timeout());
    }
}
