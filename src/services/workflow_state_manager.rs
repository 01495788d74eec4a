//! Workflow state manager: drives the state machine and appends one
//! checkpoint per transition.
//!
//! Transitions for one workflow are serialized; the store's version check
//! catches writers outside this process.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CheckpointPayload, Task, WorkflowCheckpoint, WorkflowState};
use crate::domain::ports::CheckpointStore;
use crate::services::keyed_locks::KeyedLocks;

/// Checkpointed state machine for every workflow.
pub struct WorkflowStateManager {
    store: Arc<dyn CheckpointStore>,
    locks: KeyedLocks<Uuid>,
}

impl WorkflowStateManager {
    /// Manager persisting to `store`.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Create a workflow for the task and persist its CREATED checkpoint.
    pub async fn start(&self, task: Task) -> DomainResult<WorkflowCheckpoint> {
        task.validate()?;
        let checkpoint = WorkflowCheckpoint::initial(Uuid::new_v4(), task);
        self.store.append(&checkpoint).await?;
        tracing::info!(
            workflow_id = %checkpoint.workflow_id,
            task_id = %checkpoint.payload.task.id,
            "workflow started"
        );
        Ok(checkpoint)
    }

    /// Move the workflow to `to`, applying `update` to a copy of the current
    /// payload. Refuses to leave AWAITING_APPROVAL; see [`Self::approve_transition`].
    pub async fn transition<F>(
        &self,
        workflow_id: Uuid,
        to: WorkflowState,
        update: F,
    ) -> DomainResult<WorkflowCheckpoint>
    where
        F: FnOnce(&mut CheckpointPayload) + Send,
    {
        self.advance(workflow_id, to, update, false).await
    }

    /// AWAITING_APPROVAL → COMPLETED. Reserved for the approval gate.
    pub(crate) async fn approve_transition<F>(
        &self,
        workflow_id: Uuid,
        update: F,
    ) -> DomainResult<WorkflowCheckpoint>
    where
        F: FnOnce(&mut CheckpointPayload) + Send,
    {
        self.advance(workflow_id, WorkflowState::Completed, update, true)
            .await
    }

    /// AWAITING_APPROVAL → BLOCKED. Reserved for the approval gate.
    pub(crate) async fn reject_transition<F>(
        &self,
        workflow_id: Uuid,
        update: F,
    ) -> DomainResult<WorkflowCheckpoint>
    where
        F: FnOnce(&mut CheckpointPayload) + Send,
    {
        self.advance(workflow_id, WorkflowState::Blocked, update, true)
            .await
    }

    async fn advance<F>(
        &self,
        workflow_id: Uuid,
        to: WorkflowState,
        update: F,
        from_gate: bool,
    ) -> DomainResult<WorkflowCheckpoint>
    where
        F: FnOnce(&mut CheckpointPayload) + Send,
    {
        let _guard = self.locks.lock(&workflow_id).await;
        let current = self.resume(workflow_id).await?;
        let from = current.state;

        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from,
                to,
                reason: if from.is_terminal() {
                    "workflow already finished".to_string()
                } else {
                    format!("allowed: {:?}", from.valid_transitions())
                },
            });
        }
        if from == WorkflowState::AwaitingApproval && !from_gate {
            return Err(DomainError::InvalidStateTransition {
                from,
                to,
                reason: "only the approval gate can release a parked workflow".to_string(),
            });
        }
        if from_gate && from != WorkflowState::AwaitingApproval {
            return Err(DomainError::InvalidStateTransition {
                from,
                to,
                reason: "workflow is not awaiting approval".to_string(),
            });
        }

        let mut payload = current.payload.clone();
        update(&mut payload);
        let next = current.successor(to, payload);
        self.store.append(&next).await?;

        tracing::info!(
            workflow_id = %workflow_id,
            from = from.as_str(),
            to = to.as_str(),
            version = next.version,
            "workflow transitioned"
        );
        Ok(next)
    }

    /// Latest checkpoint: the authoritative resumption point.
    pub async fn resume(&self, workflow_id: Uuid) -> DomainResult<WorkflowCheckpoint> {
        self.store
            .latest(workflow_id)
            .await?
            .ok_or(DomainError::WorkflowNotFound(workflow_id))
    }

    /// Every checkpoint of the workflow, oldest first.
    pub async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<WorkflowCheckpoint>> {
        self.store.history(workflow_id).await
    }

    /// Workflows currently parked at the approval gate.
    pub async fn awaiting_approval(&self) -> DomainResult<Vec<WorkflowCheckpoint>> {
        self.store
            .latest_in_state(WorkflowState::AwaitingApproval)
            .await
    }
}
