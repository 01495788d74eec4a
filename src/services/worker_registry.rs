//! Worker registry: resolves which worker implementation executes a task.
//!
//! Resolution order is fixed: the task's `worker` metadata tag, then its
//! task type, then the default worker.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::{Task, TaskType};
use crate::domain::ports::WorkerExecution;

/// Metadata key naming the worker a task should run on.
pub const WORKER_TAG: &str = "worker";

/// Picks the worker implementation for a task.
#[derive(Clone)]
pub struct WorkerRegistry {
    default: Arc<dyn WorkerExecution>,
    by_tag: HashMap<String, Arc<dyn WorkerExecution>>,
    by_type: HashMap<TaskType, Arc<dyn WorkerExecution>>,
}

impl WorkerRegistry {
    /// Registry that falls back to `default`.
    pub fn new(default: Arc<dyn WorkerExecution>) -> Self {
        Self {
            default,
            by_tag: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    /// Register a worker under its own name, selectable with `worker=<name>`.
    pub fn with_named(mut self, worker: Arc<dyn WorkerExecution>) -> Self {
        self.by_tag.insert(worker.name().to_string(), worker);
        self
    }

    /// Register the worker used for every task of `task_type`.
    pub fn with_task_type(mut self, task_type: TaskType, worker: Arc<dyn WorkerExecution>) -> Self {
        self.by_type.insert(task_type, worker);
        self
    }

    /// Worker named by the task's worker tag, then the one registered for its
    /// type, then the default.
    pub fn resolve(&self, task: &Task) -> Arc<dyn WorkerExecution> {
        if let Some(tag) = task.metadata_value(WORKER_TAG) {
            if let Some(worker) = self.by_tag.get(tag) {
                return worker.clone();
            }
            tracing::warn!(
                task_id = %task.id,
                worker = tag,
                "unknown worker tag, falling back"
            );
        }

        self.by_type
            .get(&task.task_type)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::workers::ScriptedWorker;

    fn registry() -> WorkerRegistry {
        WorkerRegistry::new(Arc::new(ScriptedWorker::new("default")))
            .with_named(Arc::new(ScriptedWorker::new("reviewer")))
            .with_task_type(TaskType::Security, Arc::new(ScriptedWorker::new("auditor")))
    }

    #[test]
    fn test_tag_takes_precedence() {
        let task = Task::new("review auth flow", TaskType::Security)
            .unwrap()
            .with_metadata(WORKER_TAG, "reviewer");
        assert_eq!(registry().resolve(&task).name(), "reviewer");
    }

    #[test]
    fn test_task_type_then_default() {
        let security = Task::new("review auth flow", TaskType::Security).unwrap();
        let feature = Task::new("add export", TaskType::Feature).unwrap();
        assert_eq!(registry().resolve(&security).name(), "auditor");
        assert_eq!(registry().resolve(&feature).name(), "default");
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let task = Task::new("add export", TaskType::Feature)
            .unwrap()
            .with_metadata(WORKER_TAG, "missing");
        assert_eq!(registry().resolve(&task).name(), "default");
    }
}
