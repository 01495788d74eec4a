//! Domain types shared by services and adapters.

pub mod ab_test;
pub mod approval;
pub mod config;
pub mod pattern;
pub mod routing;
pub mod score;
pub mod synthesis;
pub mod task;
pub mod violation;
pub mod worker;
pub mod workflow_state;

pub use ab_test::{AbCandidate, AbTestResult, AbWinner};
pub use approval::{ApprovalGate, ApprovalOutcome};
pub use config::{
    ApprovalConfig, Config, DatabaseConfig, ExecutorConfig, JudgeConfig, LearnerConfig,
    LoggingConfig, RoutingSection,
};
pub use pattern::{Pattern, PatternKind, Recommendation, SimilarityMetric};
pub use routing::{
    ComplexityModel, ExecutionMode, OutcomeStatus, RetryPolicy, RoutingConfig, RoutingDecision,
    WorkflowOutcome,
};
pub use score::{
    Rubric, Score, DIMENSION_COMPLETENESS, DIMENSION_COMPLIANCE_HINT, DIMENSION_CONSENSUS,
    DIMENSION_LENGTH,
};
pub use synthesis::{SynthesisResult, SynthesisStrategy};
pub use task::{Task, TaskType};
pub use violation::{has_critical, Rule, RulePredicate, Severity, Violation};
pub use worker::{all_failed, describe_failures, WorkerError, WorkerId, WorkerResult};
pub use workflow_state::{CheckpointPayload, WorkflowCheckpoint, WorkflowState};
