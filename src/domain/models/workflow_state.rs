//! Workflow state machine types.
//!
//! Every transition appends a [`WorkflowCheckpoint`]; the highest version
//! for a workflow is the authoritative resumption point.
//!
//! ```text
//! Created → Routing → Executing → Synthesizing → Scoring → AwaitingApproval → Completed
//!              ↖──────────┘ (bounded retry)             ↘──────────────────↗
//! any non-terminal state → Failed | Blocked
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ab_test::AbTestResult;
use super::routing::RoutingDecision;
use super::score::Score;
use super::synthesis::SynthesisResult;
use super::task::Task;
use super::violation::Violation;

/// Position of a workflow in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    Routing,
    Executing,
    Synthesizing,
    Scoring,
    /// Suspended until the approval gate is signalled.
    AwaitingApproval,
    Completed,
    /// Unrecoverable: every worker failed or the judge was misconfigured.
    Failed,
    /// A critical compliance violation halted the workflow.
    Blocked,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Routing => "routing",
            Self::Executing => "executing",
            Self::Synthesizing => "synthesizing",
            Self::Scoring => "scoring",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "routing" => Some(Self::Routing),
            "executing" => Some(Self::Executing),
            "synthesizing" => Some(Self::Synthesizing),
            "scoring" => Some(Self::Scoring),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<WorkflowState> {
        match self {
            Self::Created => vec![Self::Routing, Self::Failed, Self::Blocked],
            Self::Routing => vec![Self::Executing, Self::Failed, Self::Blocked],
            Self::Executing => vec![Self::Synthesizing, Self::Routing, Self::Failed, Self::Blocked],
            Self::Synthesizing => vec![Self::Scoring, Self::Failed, Self::Blocked],
            Self::Scoring => vec![
                Self::AwaitingApproval,
                Self::Completed,
                Self::Failed,
                Self::Blocked,
            ],
            Self::AwaitingApproval => vec![Self::Completed, Self::Failed, Self::Blocked],
            Self::Completed | Self::Failed | Self::Blocked => vec![],
        }
    }

    /// Whether the state machine allows `self` → `next`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot carried by every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub task: Task,
    /// Latest routing decision; recorded so routing can be audited or replayed.
    #[serde(default)]
    pub routing: Option<RoutingDecision>,
    #[serde(default)]
    pub synthesis: Option<SynthesisResult>,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub ab_test: Option<AbTestResult>,
    /// Dispatch attempt number (1-based) once execution started.
    #[serde(default)]
    pub attempt: u32,
    /// Free-form reason for the transition, e.g. the failure summary.
    #[serde(default)]
    pub note: Option<String>,
}

impl CheckpointPayload {
    /// Payload of a freshly created workflow.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            routing: None,
            synthesis: None,
            score: None,
            violations: Vec::new(),
            ab_test: None,
            attempt: 0,
            note: None,
        }
    }
}

/// Durable, versioned snapshot of a workflow at a phase boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub workflow_id: Uuid,
    /// Monotonic per workflow, starting at 1.
    pub version: u64,
    pub state: WorkflowState,
    pub payload: CheckpointPayload,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    /// First checkpoint of a new workflow.
    pub fn initial(workflow_id: Uuid, task: Task) -> Self {
        Self {
            workflow_id,
            version: 1,
            state: WorkflowState::Created,
            payload: CheckpointPayload::new(task),
            timestamp: Utc::now(),
        }
    }

    /// Build the successor checkpoint. The caller validates the transition.
    pub fn successor(&self, state: WorkflowState, payload: CheckpointPayload) -> Self {
        Self {
            workflow_id: self.workflow_id,
            version: self.version + 1,
            state,
            payload,
            timestamp: Utc::now(),
        }
    }
}
