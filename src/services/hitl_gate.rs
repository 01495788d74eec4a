//! Human-in-the-loop approval gate.
//!
//! A parked workflow stays in AWAITING_APPROVAL until [`HitlGate::approve`]
//! moves it to COMPLETED or [`HitlGate::reject`] moves it to BLOCKED. Gates
//! are durable, so a workflow can be decided from a different process than
//! the one that parked it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalGate, ApprovalOutcome, WorkflowCheckpoint, WorkflowState};
use crate::domain::ports::ApprovalRepository;
use crate::services::keyed_locks::KeyedLocks;
use crate::services::workflow_state_manager::WorkflowStateManager;

/// Recorded as the decider when a gate times out.
pub const EXPIRY_APPROVER: &str = "system";
const EXPIRY_REASON: &str = "approval expired";

enum Decision<'a> {
    Approve,
    Reject(&'a str),
}

/// Durable approval gates in front of AWAITING_APPROVAL workflows.
pub struct HitlGate {
    approvals: Arc<dyn ApprovalRepository>,
    states: Arc<WorkflowStateManager>,
    locks: KeyedLocks<Uuid>,
}

impl HitlGate {
    /// Gate over `approvals`, moving workflows through `states`.
    pub fn new(approvals: Arc<dyn ApprovalRepository>, states: Arc<WorkflowStateManager>) -> Self {
        Self {
            approvals,
            states,
            locks: KeyedLocks::new(),
        }
    }

    /// Open (or return the existing) gate for a workflow parked at AWAITING_APPROVAL.
    pub async fn request_approval(&self, workflow_id: Uuid) -> DomainResult<ApprovalGate> {
        let current = self.states.resume(workflow_id).await?;
        if current.state != WorkflowState::AwaitingApproval {
            return Err(DomainError::ValidationFailed(format!(
                "workflow {workflow_id} is {} and cannot wait for approval",
                current.state
            )));
        }

        let gate = self
            .approvals
            .insert_if_absent(&ApprovalGate::pending(workflow_id))
            .await?;
        tracing::info!(
            workflow_id = %workflow_id,
            requested_at = %gate.requested_at,
            "approval requested"
        );
        Ok(gate)
    }

    /// Approve a workflow. Returns `false` when no gate exists or the gate
    /// was rejected.
    pub async fn approve(&self, workflow_id: Uuid, approver: &str) -> DomainResult<bool> {
        Ok(self
            .approve_detailed(workflow_id, approver)
            .await?
            .is_approved())
    }

    /// Approve a workflow and report what changed.
    ///
    /// The decision is written at most once. If it was written earlier but
    /// the workflow is still parked, the recorded decision is applied now,
    /// even when it was a rejection.
    pub async fn approve_detailed(
        &self,
        workflow_id: Uuid,
        approver: &str,
    ) -> DomainResult<ApprovalOutcome> {
        self.decide(workflow_id, approver, Decision::Approve).await
    }

    /// Reject a workflow: the gate records why and the workflow moves to BLOCKED.
    pub async fn reject(
        &self,
        workflow_id: Uuid,
        approver: &str,
        reason: &str,
    ) -> DomainResult<ApprovalOutcome> {
        self.decide(workflow_id, approver, Decision::Reject(reason)).await
    }

    /// Reject every undecided gate requested before `now - max_age`.
    ///
    /// Returns the BLOCKED checkpoints written by this sweep.
    pub async fn expire_stale(
        &self,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<WorkflowCheckpoint>> {
        let cutoff = now - max_age;
        let mut expired = Vec::new();
        for gate in self.approvals.pending().await? {
            if gate.requested_at >= cutoff {
                // Pending gates come back oldest first.
                break;
            }
            if let ApprovalOutcome::Rejected(checkpoint) = self
                .reject(gate.workflow_id, EXPIRY_APPROVER, EXPIRY_REASON)
                .await?
            {
                expired.push(*checkpoint);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), cutoff = %cutoff, "expired stale approvals");
        }
        Ok(expired)
    }

    async fn decide(
        &self,
        workflow_id: Uuid,
        approver: &str,
        decision: Decision<'_>,
    ) -> DomainResult<ApprovalOutcome> {
        let _guard = self.locks.lock(&workflow_id).await;

        let now = Utc::now();
        let written = match decision {
            Decision::Approve => {
                self.approvals
                    .mark_approved(workflow_id, approver, now)
                    .await?
            }
            Decision::Reject(reason) => {
                self.approvals
                    .mark_rejected(workflow_id, approver, reason, now)
                    .await?
            }
        };
        if !written {
            tracing::debug!(workflow_id = %workflow_id, "gate missing or already decided");
        }

        // Another process may have decided first; the stored gate wins.
        let Some(gate) = self.approvals.get(workflow_id).await? else {
            tracing::warn!(workflow_id = %workflow_id, "no approval gate for workflow");
            return Ok(ApprovalOutcome::NotFound);
        };
        let decided_by = gate.approver.clone().unwrap_or_else(|| approver.to_string());

        let current = self.states.resume(workflow_id).await?;
        if current.state != WorkflowState::AwaitingApproval {
            tracing::debug!(
                workflow_id = %workflow_id,
                state = current.state.as_str(),
                "decision already applied"
            );
            return Ok(if gate.is_rejected() {
                ApprovalOutcome::AlreadyRejected
            } else {
                ApprovalOutcome::AlreadyApproved
            });
        }

        if gate.is_rejected() {
            let reason = gate.rejection_reason.unwrap_or_default();
            let checkpoint = self
                .states
                .reject_transition(workflow_id, |payload| {
                    payload.note = Some(format!("rejected by {decided_by}: {reason}"));
                })
                .await?;
            tracing::info!(
                workflow_id = %workflow_id,
                approver = %decided_by,
                version = checkpoint.version,
                "workflow rejected"
            );
            return Ok(ApprovalOutcome::Rejected(Box::new(checkpoint)));
        }

        let checkpoint = self
            .states
            .approve_transition(workflow_id, |payload| {
                payload.note = Some(format!("approved by {decided_by}"));
            })
            .await?;
        tracing::info!(
            workflow_id = %workflow_id,
            approver = %decided_by,
            version = checkpoint.version,
            "workflow approved"
        );
        Ok(ApprovalOutcome::Approved(Box::new(checkpoint)))
    }

    /// Gates still waiting for a decision, oldest first.
    pub async fn pending(&self) -> DomainResult<Vec<ApprovalGate>> {
        self.approvals.pending().await
    }

    /// The stored gate for a workflow, decided or not.
    pub async fn gate(&self, workflow_id: Uuid) -> DomainResult<Option<ApprovalGate>> {
        self.approvals.get(workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryApprovalRepository, InMemoryCheckpointStore};
    use crate::domain::models::{Task, TaskType};

    struct Fixture {
        states: Arc<WorkflowStateManager>,
        approvals: Arc<InMemoryApprovalRepository>,
        gate: HitlGate,
    }

    fn fixture() -> Fixture {
        let states = Arc::new(WorkflowStateManager::new(Arc::new(InMemoryCheckpointStore::new())));
        let approvals = Arc::new(InMemoryApprovalRepository::new());
        let gate = HitlGate::new(approvals.clone(), states.clone());
        Fixture {
            states,
            approvals,
            gate,
        }
    }

    async fn parked(states: &WorkflowStateManager) -> Uuid {
        let task = Task::new("rotate signing keys", TaskType::Security).unwrap();
        let id = states.start(task).await.unwrap().workflow_id;
        for state in [
            WorkflowState::Routing,
            WorkflowState::Executing,
            WorkflowState::Synthesizing,
            WorkflowState::Scoring,
            WorkflowState::AwaitingApproval,
        ] {
            states.transition(id, state, |_| {}).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_request_is_idempotent() {
        let f = fixture();
        let id = parked(&f.states).await;

        let first = f.gate.request_approval(id).await.unwrap();
        let second = f.gate.request_approval(id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.gate.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_requires_parked_workflow() {
        let f = fixture();
        let task = Task::new("rotate signing keys", TaskType::Security).unwrap();
        let id = f.states.start(task).await.unwrap().workflow_id;

        assert!(f.gate.request_approval(id).await.is_err());
    }

    #[tokio::test]
    async fn test_approve_completes_workflow_once() {
        let f = fixture();
        let id = parked(&f.states).await;
        f.gate.request_approval(id).await.unwrap();

        let outcome = f.gate.approve_detailed(id, "alice").await.unwrap();
        let ApprovalOutcome::Approved(checkpoint) = outcome else {
            panic!("expected approval to complete the workflow");
        };
        assert_eq!(checkpoint.state, WorkflowState::Completed);
        assert_eq!(checkpoint.payload.note.as_deref(), Some("approved by alice"));

        let again = f.gate.approve_detailed(id, "bob").await.unwrap();
        assert_eq!(again, ApprovalOutcome::AlreadyApproved);
        assert!(f.gate.approve(id, "bob").await.unwrap());

        let gate = f.gate.gate(id).await.unwrap().unwrap();
        assert_eq!(gate.approver.as_deref(), Some("alice"));
        assert!(f.gate.pending().await.unwrap().is_empty());
        assert_eq!(f.states.history(id).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_unknown_gate_is_not_found() {
        let f = fixture();
        assert!(!f.gate.approve(Uuid::new_v4(), "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_recorded_approval_finishes_parked_workflow() {
        let f = fixture();
        let id = parked(&f.states).await;
        f.gate.request_approval(id).await.unwrap();
        // Approval written, transition lost.
        f.approvals.mark_approved(id, "alice", Utc::now()).await.unwrap();

        let outcome = f.gate.approve_detailed(id, "bob").await.unwrap();
        let ApprovalOutcome::Approved(checkpoint) = outcome else {
            panic!("expected the parked workflow to complete");
        };
        assert_eq!(checkpoint.payload.note.as_deref(), Some("approved by alice"));
    }

    #[tokio::test]
    async fn test_reject_blocks_workflow_and_wins_over_later_approval() {
        let f = fixture();
        let id = parked(&f.states).await;
        f.gate.request_approval(id).await.unwrap();

        let outcome = f.gate.reject(id, "carol", "no rollback plan").await.unwrap();
        let ApprovalOutcome::Rejected(checkpoint) = outcome else {
            panic!("expected rejection to block the workflow");
        };
        assert_eq!(checkpoint.state, WorkflowState::Blocked);
        assert_eq!(
            checkpoint.payload.note.as_deref(),
            Some("rejected by carol: no rollback plan")
        );

        assert!(!f.gate.approve(id, "alice").await.unwrap());
        assert_eq!(
            f.gate.approve_detailed(id, "alice").await.unwrap(),
            ApprovalOutcome::AlreadyRejected
        );
        assert_eq!(f.states.resume(id).await.unwrap().state, WorkflowState::Blocked);
        assert!(f.gate.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_after_approval_is_refused() {
        let f = fixture();
        let id = parked(&f.states).await;
        f.gate.request_approval(id).await.unwrap();
        f.gate.approve(id, "alice").await.unwrap();

        let outcome = f.gate.reject(id, "carol", "too late").await.unwrap();
        assert_eq!(outcome, ApprovalOutcome::AlreadyApproved);
        assert_eq!(f.states.resume(id).await.unwrap().state, WorkflowState::Completed);
    }

    #[tokio::test]
    async fn test_expire_stale_rejects_only_old_gates() {
        let f = fixture();
        let old = parked(&f.states).await;
        let fresh = parked(&f.states).await;
        f.approvals
            .insert_if_absent(&ApprovalGate {
                requested_at: Utc::now() - chrono::Duration::hours(2),
                ..ApprovalGate::pending(old)
            })
            .await
            .unwrap();
        f.gate.request_approval(fresh).await.unwrap();

        let expired = f
            .gate
            .expire_stale(chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].workflow_id, old);
        assert_eq!(expired[0].state, WorkflowState::Blocked);
        let gate = f.gate.gate(old).await.unwrap().unwrap();
        assert_eq!(gate.approver.as_deref(), Some(EXPIRY_APPROVER));
        assert_eq!(gate.rejection_reason.as_deref(), Some("approval expired"));

        let pending = f.gate.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].workflow_id, fresh);
        assert_eq!(f.states.resume(fresh).await.unwrap().state, WorkflowState::AwaitingApproval);
    }
}
