//! In-memory checkpoint store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{WorkflowCheckpoint, WorkflowState};
use crate::domain::ports::CheckpointStore;

/// Checkpoints held in process memory. Lost on exit.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    workflows: Arc<RwLock<HashMap<Uuid, Vec<WorkflowCheckpoint>>>>,
}

impl InMemoryCheckpointStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn append(&self, checkpoint: &WorkflowCheckpoint) -> DomainResult<()> {
        let mut workflows = self.workflows.write().await;
        let history = workflows.entry(checkpoint.workflow_id).or_default();

        let expected = history.last().map_or(1, |c| c.version + 1);
        if checkpoint.version != expected {
            return Err(DomainError::VersionConflict {
                workflow_id: checkpoint.workflow_id,
                expected,
                actual: checkpoint.version,
            });
        }

        history.push(checkpoint.clone());
        Ok(())
    }

    async fn latest(&self, workflow_id: Uuid) -> DomainResult<Option<WorkflowCheckpoint>> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .get(&workflow_id)
            .and_then(|history| history.last().cloned()))
    }

    async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<WorkflowCheckpoint>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&workflow_id).cloned().unwrap_or_default())
    }

    async fn latest_in_state(&self, state: WorkflowState) -> DomainResult<Vec<WorkflowCheckpoint>> {
        let workflows = self.workflows.read().await;
        let mut parked: Vec<WorkflowCheckpoint> = workflows
            .values()
            .filter_map(|history| history.last())
            .filter(|c| c.state == state)
            .cloned()
            .collect();
        parked.sort_by_key(|c| c.timestamp);
        Ok(parked)
    }
}
