//! Approval gate repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ApprovalGate;

/// Durable storage for approval gates.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Insert the gate unless one exists for the workflow. Returns the stored gate.
    async fn insert_if_absent(&self, gate: &ApprovalGate) -> DomainResult<ApprovalGate>;

    async fn get(&self, workflow_id: Uuid) -> DomainResult<Option<ApprovalGate>>;

    /// Record the approval if the gate is still undecided.
    ///
    /// Returns `true` only for the call that actually wrote it.
    async fn mark_approved(
        &self,
        workflow_id: Uuid,
        approver: &str,
        approved_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Record the rejection if the gate is still undecided. Same contract as
    /// [`Self::mark_approved`].
    async fn mark_rejected(
        &self,
        workflow_id: Uuid,
        approver: &str,
        reason: &str,
        rejected_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Undecided gates, oldest first.
    async fn pending(&self) -> DomainResult<Vec<ApprovalGate>>;
}
