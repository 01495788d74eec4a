//! Worker execution port.
//!
//! A worker is one execution of a role against a task. What the role does is
//! opaque here: it takes the task and returns a text report.

use async_trait::async_trait;

use crate::domain::models::{Task, WorkerId};

/// Something that can run one worker against a task.
#[async_trait]
pub trait WorkerExecution: Send + Sync {
    /// Name used in logs and registry lookups.
    fn name(&self) -> &str;

    /// Produce this worker's output for the task.
    async fn run(&self, task: &Task, worker_id: WorkerId) -> anyhow::Result<String>;
}
