//! Routing configuration, routing decisions and workflow outcomes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ab_test::AbTestResult;
use super::score::{Rubric, Score};
use super::synthesis::{SynthesisResult, SynthesisStrategy};
use super::task::Task;
use super::violation::Violation;
use super::worker::WorkerId;
use crate::domain::errors::{DomainError, DomainResult};

/// How many workers attempt a task and how their outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One worker.
    Sequential,
    /// Several workers merged with one strategy.
    Concurrent,
    /// Several workers merged with two strategies; the judge picks the better one.
    MixtureOfStrategies,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Concurrent
    }
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
            Self::MixtureOfStrategies => "mixture-of-strategies",
        }
    }
}

/// Tunables for the complexity estimate that drives adaptive routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityModel {
    /// Complexity (0-100) at or above which work is fanned out.
    pub threshold: f64,
    /// Width of one complexity band; band = 1 + complexity / width.
    pub band_width: f64,
    /// Keywords that each add to the complexity estimate.
    pub keywords: Vec<String>,
    /// Points added per matched keyword.
    pub keyword_weight: f64,
    /// Points per description word, capped at `max_length_points`.
    pub length_weight: f64,
    pub max_length_points: f64,
}

impl Default for ComplexityModel {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            band_width: 20.0,
            keywords: [
                "concurrent",
                "distributed",
                "migration",
                "refactor",
                "security",
                "performance",
                "database",
                "authentication",
                "integration",
                "end-to-end",
                "architecture",
                "race",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            keyword_weight: 8.0,
            length_weight: 1.5,
            max_length_points: 30.0,
        }
    }
}

/// Bounded retry policy for dispatches where every worker failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total dispatch attempts, including the first. 1 disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Extra workers added on each retry.
    pub worker_growth: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            worker_growth: 1,
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_attempts == 0 {
            return Err(DomainError::InvalidConfiguration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(DomainError::InvalidConfiguration(format!(
                "initial backoff ({}ms) exceeds max backoff ({}ms)",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Whether another dispatch is allowed after `attempt` attempts.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Exponential backoff before retry number `retry` (1-based), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(exponent))
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Caller-supplied routing configuration.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub mode: ExecutionMode,
    /// Requested worker count. Forced to 1 in sequential mode.
    pub worker_count: u32,
    pub max_workers: u32,
    /// When true, the complexity estimate decides mode and worker count.
    pub adaptive: bool,
    pub complexity: ComplexityModel,
    pub strategy: SynthesisStrategy,
    /// Second strategy raced against `strategy` in mixture-of-strategies mode.
    pub alternate_strategy: SynthesisStrategy,
    pub worker_timeout: Duration,
    pub require_approval: bool,
    pub rubric: Rubric,
    pub retry: RetryPolicy,
    /// Per-worker reliability weights for weighted-vote synthesis.
    pub reliability: BTreeMap<WorkerId, f64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Concurrent,
            worker_count: 3,
            max_workers: 5,
            adaptive: true,
            complexity: ComplexityModel::default(),
            strategy: SynthesisStrategy::Consensus,
            alternate_strategy: SynthesisStrategy::WeightedVote,
            worker_timeout: Duration::from_secs(300),
            require_approval: false,
            rubric: Rubric::default(),
            retry: RetryPolicy::default(),
            reliability: BTreeMap::new(),
        }
    }
}

impl RoutingConfig {
    /// Fail fast on programmer errors before any worker is dispatched.
    pub fn validate(&self) -> DomainResult<()> {
        if self.worker_count == 0 {
            return Err(DomainError::InvalidConfiguration(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(DomainError::InvalidConfiguration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.worker_timeout.is_zero() {
            return Err(DomainError::InvalidConfiguration(
                "worker_timeout must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.complexity.threshold) {
            return Err(DomainError::InvalidConfiguration(format!(
                "complexity threshold must be within 0-100, got {}",
                self.complexity.threshold
            )));
        }
        if self.complexity.band_width.is_nan() || self.complexity.band_width < 1.0 {
            return Err(DomainError::InvalidConfiguration(format!(
                "complexity band_width must be at least 1, got {}",
                self.complexity.band_width
            )));
        }
        if self.mode == ExecutionMode::MixtureOfStrategies && self.strategy == self.alternate_strategy
        {
            return Err(DomainError::InvalidConfiguration(format!(
                "mixture-of-strategies needs two different strategies, got {} twice",
                self.strategy
            )));
        }
        self.rubric.validate()?;
        self.retry.validate()
    }
}

/// The recorded outcome of routing one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: ExecutionMode,
    pub worker_count: u32,
    pub complexity: f64,
    pub complexity_band: u32,
    pub strategy: SynthesisStrategy,
    pub reason: String,
    /// Dispatch attempt this decision applies to (1-based).
    pub attempt: u32,
    pub decided_at: DateTime<Utc>,
}

/// Final status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Completed,
    /// Parked at the approval gate; not finished.
    AwaitingApproval,
    Failed,
    Blocked,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::AwaitingApproval => "AWAITING_APPROVAL",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        }
    }

    /// Whether the workflow reached an end state, as opposed to waiting on a human.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::AwaitingApproval)
    }
}

/// Structured result of a workflow, emitted to external reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub workflow_id: Uuid,
    pub task: Task,
    pub status: OutcomeStatus,
    pub routing: Option<RoutingDecision>,
    pub synthesis: Option<SynthesisResult>,
    pub score: Option<Score>,
    pub violations: Vec<Violation>,
    /// Number of dispatch attempts made.
    pub attempts: u32,
    pub error: Option<String>,
    /// Version of the checkpoint that recorded this outcome.
    pub checkpoint_version: u64,
    pub ab_test: Option<AbTestResult>,
}
