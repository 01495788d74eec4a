//! Domain errors for the orchestration engine.

use thiserror::Error;
use uuid::Uuid;

use super::models::WorkflowState;

/// Domain-level errors that can occur while driving a workflow.
///
/// Worker failures and synthesis conflicts never appear here: they are
/// absorbed into [`WorkerResult`](super::models::WorkerResult) and
/// [`SynthesisResult`](super::models::SynthesisResult) as data.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: WorkflowState,
        to: WorkflowState,
        reason: String,
    },

    #[error("Checkpoint version conflict for workflow {workflow_id}: expected {expected}, got {actual}")]
    VersionConflict {
        workflow_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the error is a storage failure that must abort the current operation.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::VersionConflict { .. })
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
