//! Checkpoint store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{WorkflowCheckpoint, WorkflowState};

/// Append-only, versioned persistence for workflow checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a checkpoint. Its version must be exactly `latest + 1`
    /// (or 1 for a new workflow), otherwise `VersionConflict`.
    async fn append(&self, checkpoint: &WorkflowCheckpoint) -> DomainResult<()>;

    /// Highest-version checkpoint for a workflow.
    async fn latest(&self, workflow_id: Uuid) -> DomainResult<Option<WorkflowCheckpoint>>;

    /// All checkpoints for a workflow, ascending by version.
    async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<WorkflowCheckpoint>>;

    /// Latest checkpoints of every workflow whose current state is `state`.
    async fn latest_in_state(&self, state: WorkflowState) -> DomainResult<Vec<WorkflowCheckpoint>>;
}
