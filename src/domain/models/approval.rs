//! Human approval gates and the result of deciding them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow_state::WorkflowCheckpoint;

/// Durable record that a workflow is waiting on a human decision.
///
/// Gates are never deleted. A gate is decided at most once: either
/// `approved_at` or `rejected_at` is written, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub workflow_id: Uuid,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    /// Who made the decision, whichever way it went.
    pub approver: Option<String>,
}

impl ApprovalGate {
    /// An undecided gate requested now.
    pub fn pending(workflow_id: Uuid) -> Self {
        Self {
            workflow_id,
            requested_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            approver: None,
        }
    }

    /// Approval recorded.
    pub const fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }

    /// Rejection recorded.
    pub const fn is_rejected(&self) -> bool {
        self.rejected_at.is_some()
    }

    /// Either decision recorded.
    pub const fn is_decided(&self) -> bool {
        self.is_approved() || self.is_rejected()
    }
}

/// What an approval attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// The gate was approved now and the workflow moved to COMPLETED.
    Approved(Box<WorkflowCheckpoint>),
    /// The gate was rejected now and the workflow moved to BLOCKED.
    Rejected(Box<WorkflowCheckpoint>),
    /// The gate had already been approved. Nothing new happened.
    AlreadyApproved,
    /// The gate had already been rejected. Nothing new happened.
    AlreadyRejected,
    /// No gate exists for the workflow.
    NotFound,
}

impl ApprovalOutcome {
    /// Whether the gate is (now) approved.
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved(_) | Self::AlreadyApproved)
    }

    /// Whether the gate is (now) rejected.
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::AlreadyRejected)
    }
}
