//! In-memory approval gate repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ApprovalGate;
use crate::domain::ports::ApprovalRepository;

/// Approval gates held in a map. Lost on drop.
#[derive(Clone, Default)]
pub struct InMemoryApprovalRepository {
    gates: Arc<RwLock<HashMap<Uuid, ApprovalGate>>>,
}

impl InMemoryApprovalRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn insert_if_absent(&self, gate: &ApprovalGate) -> DomainResult<ApprovalGate> {
        let mut gates = self.gates.write().await;
        Ok(gates
            .entry(gate.workflow_id)
            .or_insert_with(|| gate.clone())
            .clone())
    }

    async fn get(&self, workflow_id: Uuid) -> DomainResult<Option<ApprovalGate>> {
        Ok(self.gates.read().await.get(&workflow_id).cloned())
    }

    async fn mark_approved(
        &self,
        workflow_id: Uuid,
        approver: &str,
        approved_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut gates = self.gates.write().await;
        match gates.get_mut(&workflow_id) {
            Some(gate) if !gate.is_decided() => {
                gate.approved_at = Some(approved_at);
                gate.approver = Some(approver.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_rejected(
        &self,
        workflow_id: Uuid,
        approver: &str,
        reason: &str,
        rejected_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut gates = self.gates.write().await;
        match gates.get_mut(&workflow_id) {
            Some(gate) if !gate.is_decided() => {
                gate.rejected_at = Some(rejected_at);
                gate.rejection_reason = Some(reason.to_string());
                gate.approver = Some(approver.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending(&self) -> DomainResult<Vec<ApprovalGate>> {
        let gates = self.gates.read().await;
        let mut pending: Vec<ApprovalGate> = gates
            .values()
            .filter(|g| !g.is_decided())
            .cloned()
            .collect();
        pending.sort_by_key(|g| g.requested_at);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_is_decided_once() {
        let repo = InMemoryApprovalRepository::new();
        let id = Uuid::new_v4();
        repo.insert_if_absent(&ApprovalGate::pending(id)).await.unwrap();

        assert!(repo.mark_rejected(id, "carol", "too risky", Utc::now()).await.unwrap());
        assert!(!repo.mark_approved(id, "alice", Utc::now()).await.unwrap());
        assert!(!repo.mark_rejected(id, "dave", "nope", Utc::now()).await.unwrap());

        let gate = repo.get(id).await.unwrap().unwrap();
        assert!(gate.is_rejected());
        assert!(!gate.is_approved());
        assert_eq!(gate.approver.as_deref(), Some("carol"));
        assert_eq!(gate.rejection_reason.as_deref(), Some("too risky"));
        assert!(repo.pending().await.unwrap().is_empty());
    }
}
