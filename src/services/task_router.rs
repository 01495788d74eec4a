//! Task router: the entry point that drives one task through the workflow.
//!
//! ```text
//! route(task)
//!   ├─ CREATED → ROUTING      decide mode + worker count
//!   ├─ ROUTING → EXECUTING    run K workers
//!   │     └─ all failed? ── retry left: back to ROUTING ── else: FAILED
//!   ├─ EXECUTING → SYNTHESIZING
//!   ├─ SYNTHESIZING → SCORING judge + observer
//!   └─ SCORING → BLOCKED | AWAITING_APPROVAL | COMPLETED
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    all_failed, describe_failures, has_critical, ApprovalOutcome, ComplexityModel,
    ExecutionMode, OutcomeStatus, RoutingConfig, RoutingDecision, Rule, Score, SynthesisResult,
    Task, TaskType, WorkerResult, WorkflowCheckpoint, WorkflowOutcome, WorkflowState,
};
use crate::services::ab_tester::AbTester;
use crate::services::concurrent_executor::ConcurrentExecutor;
use crate::services::hitl_gate::HitlGate;
use crate::services::judge::Judge;
use crate::services::learner::Learner;
use crate::services::observer::{default_rules, Observer};
use crate::services::output_synthesizer::OutputSynthesizer;
use crate::services::worker_registry::WorkerRegistry;
use crate::services::workflow_state_manager::WorkflowStateManager;

/// Drives tasks through routing, execution, synthesis, scoring and approval.
pub struct TaskRouter {
    states: Arc<WorkflowStateManager>,
    executor: ConcurrentExecutor,
    workers: WorkerRegistry,
    learner: Arc<Learner>,
    gate: Arc<HitlGate>,
    judge: Judge,
    observer: Observer,
    rules: Vec<Rule>,
}

/// Result of the execution phase.
enum Dispatch {
    Succeeded {
        decision: RoutingDecision,
        results: Vec<WorkerResult>,
    },
    Exhausted(WorkflowOutcome),
}

impl TaskRouter {
    /// Router with the default judge and compliance rules.
    pub fn new(
        states: Arc<WorkflowStateManager>,
        executor: ConcurrentExecutor,
        workers: WorkerRegistry,
        learner: Arc<Learner>,
        gate: Arc<HitlGate>,
    ) -> Self {
        Self {
            states,
            executor,
            workers,
            learner,
            gate,
            judge: Judge::default(),
            observer: Observer::new(),
            rules: default_rules(),
        }
    }

    /// Replace the judge used when scoring.
    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.judge = judge;
        self
    }

    /// Replace the compliance rules checked after scoring.
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Workflow state manager shared with the gate.
    pub fn states(&self) -> &Arc<WorkflowStateManager> {
        &self.states
    }

    /// Approval gate for parked workflows.
    pub fn gate(&self) -> &Arc<HitlGate> {
        &self.gate
    }

    /// Learner fed by every finished workflow.
    pub fn learner(&self) -> &Arc<Learner> {
        &self.learner
    }

    /// Drive a task to a finished outcome or to the approval gate.
    ///
    /// # Errors
    /// `InvalidConfiguration` before anything is persisted when the task or
    /// configuration is unusable; storage failures are propagated as-is.
    #[instrument(skip(self, task, config), fields(task_id = %task.id, task_type = task.task_type.as_str()))]
    pub async fn route(&self, task: Task, config: &RoutingConfig) -> DomainResult<WorkflowOutcome> {
        task.validate()
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;

        let workflow_id = self.states.start(task.clone()).await?.workflow_id;
        let complexity = estimate_complexity(&task, &config.complexity);

        let (decision, results) = match self.dispatch(workflow_id, &task, config, complexity).await? {
            Dispatch::Succeeded { decision, results } => (decision, results),
            Dispatch::Exhausted(outcome) => return Ok(outcome),
        };

        // Synthesis. Mixture mode races two strategies and keeps the better one.
        let (synthesis, ab_test, precomputed) = if decision.mode == ExecutionMode::MixtureOfStrategies {
            let tester = AbTester::new(
                OutputSynthesizer::with_reliability(config.reliability.clone()),
                self.judge.clone(),
            );
            match tester.compare(
                task.id,
                &results,
                config.strategy,
                config.alternate_strategy,
                &config.rubric,
            ) {
                Ok(ab) => {
                    let winner = ab.winning().clone();
                    (winner.synthesis, Some(ab), Some(winner.score))
                }
                Err(error) => {
                    return self
                        .fail(workflow_id, format!("strategy comparison failed: {error}"))
                        .await;
                }
            }
        } else {
            let synthesizer = OutputSynthesizer::with_reliability(config.reliability.clone());
            (synthesizer.synthesize(task.id, &results, decision.strategy), None, None)
        };

        if synthesis.conflict_detected {
            tracing::info!(workflow_id = %workflow_id, "workers disagreed; synthesis flagged a conflict");
        }

        {
            let synthesis = synthesis.clone();
            let ab_test = ab_test.clone();
            self.states
                .transition(workflow_id, WorkflowState::Synthesizing, move |p| {
                    p.synthesis = Some(synthesis);
                    p.ab_test = ab_test;
                })
                .await?;
        }

        // Scoring and compliance.
        let score = match precomputed {
            Some(score) => score,
            None => match self.judge.score(&synthesis, &config.rubric) {
                Ok(score) => score,
                Err(error) => {
                    return self
                        .fail(workflow_id, format!("judge rejected the rubric: {error}"))
                        .await;
                }
            },
        };
        let violations = self.observer.check(&task, &synthesis, &self.rules);

        {
            let score = score.clone();
            let violations = violations.clone();
            self.states
                .transition(workflow_id, WorkflowState::Scoring, move |p| {
                    p.score = Some(score);
                    p.violations = violations;
                })
                .await?;
        }

        if let Some(ab) = &ab_test {
            self.learner.record_experiment(ab, &task).await?;
        }

        if has_critical(&violations) {
            let reason = violations
                .iter()
                .filter(|v| v.is_critical())
                .map(|v| v.rule_id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                workflow_id = %workflow_id,
                final_score = score.final_score,
                rules = %reason,
                "critical violation, workflow blocked"
            );
            let note = format!("blocked by {reason}");
            let checkpoint = self
                .states
                .transition(workflow_id, WorkflowState::Blocked, move |p| p.note = Some(note))
                .await?;
            return self.finish(&checkpoint, OutcomeStatus::Blocked).await;
        }

        if config.require_approval {
            let checkpoint = self
                .states
                .transition(workflow_id, WorkflowState::AwaitingApproval, |_| {})
                .await?;
            self.gate.request_approval(workflow_id).await?;
            return Ok(outcome_from(&checkpoint, OutcomeStatus::AwaitingApproval));
        }

        let checkpoint = self
            .states
            .transition(workflow_id, WorkflowState::Completed, |_| {})
            .await?;
        self.finish(&checkpoint, OutcomeStatus::Completed).await
    }

    /// Approve a parked workflow and learn from the completed outcome.
    ///
    /// Retrying after a crash between the transition and the learning step
    /// returns `AlreadyApproved` and still learns, once.
    pub async fn complete_approval(
        &self,
        workflow_id: Uuid,
        approver: &str,
    ) -> DomainResult<ApprovalOutcome> {
        let outcome = self.gate.approve_detailed(workflow_id, approver).await?;
        self.learn_decision(workflow_id, &outcome).await?;
        Ok(outcome)
    }

    /// Reject a parked workflow. It ends BLOCKED and is learned from as an
    /// error pattern carrying the reason.
    pub async fn reject_approval(
        &self,
        workflow_id: Uuid,
        approver: &str,
        reason: &str,
    ) -> DomainResult<ApprovalOutcome> {
        let outcome = self.gate.reject(workflow_id, approver, reason).await?;
        self.learn_decision(workflow_id, &outcome).await?;
        Ok(outcome)
    }

    /// Reject every approval requested more than `max_age` ago. Returns the
    /// workflows this sweep moved to BLOCKED.
    pub async fn expire_stale_approvals(&self, max_age: Duration) -> DomainResult<Vec<Uuid>> {
        let max_age = chrono::Duration::from_std(max_age).map_err(|e| {
            DomainError::InvalidConfiguration(format!("approval expiry out of range: {e}"))
        })?;
        let expired = self.gate.expire_stale(max_age, Utc::now()).await?;
        let mut ids = Vec::with_capacity(expired.len());
        for checkpoint in &expired {
            self.learner
                .ingest(&outcome_from(checkpoint, OutcomeStatus::Blocked))
                .await?;
            ids.push(checkpoint.workflow_id);
        }
        Ok(ids)
    }

    /// Learn from whatever state an approval decision left the workflow in.
    async fn learn_decision(&self, workflow_id: Uuid, outcome: &ApprovalOutcome) -> DomainResult<()> {
        let (checkpoint, status, retried) = match outcome {
            ApprovalOutcome::Approved(checkpoint) => {
                ((**checkpoint).clone(), OutcomeStatus::Completed, false)
            }
            ApprovalOutcome::Rejected(checkpoint) => {
                ((**checkpoint).clone(), OutcomeStatus::Blocked, false)
            }
            ApprovalOutcome::AlreadyApproved => (
                self.states.resume(workflow_id).await?,
                OutcomeStatus::Completed,
                true,
            ),
            ApprovalOutcome::AlreadyRejected => (
                self.states.resume(workflow_id).await?,
                OutcomeStatus::Blocked,
                true,
            ),
            ApprovalOutcome::NotFound => return Ok(()),
        };

        let terminal = if status == OutcomeStatus::Completed {
            WorkflowState::Completed
        } else {
            WorkflowState::Blocked
        };
        if checkpoint.state != terminal {
            return Ok(());
        }

        let learned = outcome_from(&checkpoint, status);
        if retried && self.learner.has_learned(&learned).await? {
            return Ok(());
        }
        if retried {
            tracing::info!(workflow_id = %workflow_id, "learning from decided workflow on retry");
        }
        self.learner.ingest(&learned).await?;
        Ok(())
    }

    /// Routing and execution, retried while every worker fails and the
    /// policy allows another attempt.
    async fn dispatch(
        &self,
        workflow_id: Uuid,
        task: &Task,
        config: &RoutingConfig,
        complexity: f64,
    ) -> DomainResult<Dispatch> {
        let worker = self.workers.resolve(task);
        let mut attempt = 1;

        loop {
            let decision = decide(config, complexity, attempt);
            tracing::info!(
                workflow_id = %workflow_id,
                attempt,
                mode = decision.mode.as_str(),
                worker_count = decision.worker_count,
                complexity = decision.complexity,
                "routing decided"
            );

            {
                let decision = decision.clone();
                self.states
                    .transition(workflow_id, WorkflowState::Routing, move |p| {
                        p.routing = Some(decision);
                        p.attempt = attempt;
                    })
                    .await?;
            }
            self.states
                .transition(workflow_id, WorkflowState::Executing, |_| {})
                .await?;

            let results = self
                .executor
                .execute(task, worker.clone(), decision.worker_count, config.worker_timeout)
                .await;

            if !all_failed(&results) {
                return Ok(Dispatch::Succeeded { decision, results });
            }

            let failures = describe_failures(&results);
            if config.retry.allows_retry(attempt) {
                let delay = config.retry.backoff(attempt);
                tracing::warn!(
                    workflow_id = %workflow_id,
                    attempt,
                    backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    failures = %failures,
                    "all workers failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            tracing::error!(
                workflow_id = %workflow_id,
                attempts = attempt,
                failures = %failures,
                "all workers failed"
            );
            let error = format!("all workers failed after {attempt} attempt(s): {failures}");
            let synthesis = SynthesisResult::empty(task.id, decision.strategy);
            let score = Score::terminal_failure(task.id);
            let checkpoint = self
                .states
                .transition(workflow_id, WorkflowState::Failed, move |p| {
                    p.synthesis = Some(synthesis);
                    p.score = Some(score);
                    p.note = Some(error);
                })
                .await?;
            let outcome = self.finish(&checkpoint, OutcomeStatus::Failed).await?;
            return Ok(Dispatch::Exhausted(outcome));
        }
    }

    async fn fail(&self, workflow_id: Uuid, error: String) -> DomainResult<WorkflowOutcome> {
        tracing::error!(workflow_id = %workflow_id, error = %error, "workflow failed");
        let checkpoint = self
            .states
            .transition(workflow_id, WorkflowState::Failed, move |p| p.note = Some(error))
            .await?;
        self.finish(&checkpoint, OutcomeStatus::Failed).await
    }

    /// Learn from a finished workflow and build its outcome.
    async fn finish(
        &self,
        checkpoint: &WorkflowCheckpoint,
        status: OutcomeStatus,
    ) -> DomainResult<WorkflowOutcome> {
        let outcome = outcome_from(checkpoint, status);
        self.learner.ingest(&outcome).await?;
        tracing::info!(
            workflow_id = %outcome.workflow_id,
            status = status.as_str(),
            version = outcome.checkpoint_version,
            "workflow finished"
        );
        Ok(outcome)
    }
}

fn outcome_from(checkpoint: &WorkflowCheckpoint, status: OutcomeStatus) -> WorkflowOutcome {
    let payload = &checkpoint.payload;
    WorkflowOutcome {
        workflow_id: checkpoint.workflow_id,
        task: payload.task.clone(),
        status,
        routing: payload.routing.clone(),
        synthesis: payload.synthesis.clone(),
        score: payload.score.clone(),
        violations: payload.violations.clone(),
        attempts: payload.attempt,
        error: match status {
            OutcomeStatus::Failed | OutcomeStatus::Blocked => payload.note.clone(),
            OutcomeStatus::Completed | OutcomeStatus::AwaitingApproval => None,
        },
        checkpoint_version: checkpoint.version,
        ab_test: payload.ab_test.clone(),
    }
}

fn type_weight(task_type: TaskType) -> f64 {
    match task_type {
        TaskType::Architecture => 35.0,
        TaskType::Security => 30.0,
        TaskType::Feature => 20.0,
        TaskType::Bug | TaskType::General => 10.0,
    }
}

/// Complexity in 0..=100 from task type, description length and keyword hits.
pub fn estimate_complexity(task: &Task, model: &ComplexityModel) -> f64 {
    let description = task.description.to_lowercase();
    let words = description.split_whitespace().count() as f64;
    let length_points = (words * model.length_weight).min(model.max_length_points);
    let keyword_hits = model
        .keywords
        .iter()
        .filter(|keyword| description.contains(&keyword.to_lowercase()))
        .count() as f64;

    let raw = type_weight(task.task_type) + length_points + keyword_hits * model.keyword_weight;
    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// Routing decision for dispatch attempt `attempt` (1-based).
pub fn decide(config: &RoutingConfig, complexity: f64, attempt: u32) -> RoutingDecision {
    // Float-to-int casts saturate, so only the increment can overflow.
    let band = 1_u32.saturating_add((complexity / config.complexity.band_width).floor() as u32);
    let growth = attempt.saturating_sub(1).saturating_mul(config.retry.worker_growth);

    let (mode, base_count, reason) = if config.mode == ExecutionMode::Sequential {
        (ExecutionMode::Sequential, 1, "sequential mode requested".to_string())
    } else if !config.adaptive {
        (
            config.mode,
            config.worker_count,
            format!("{} mode requested with {} workers", config.mode.as_str(), config.worker_count),
        )
    } else if complexity >= config.complexity.threshold {
        (
            config.mode,
            band,
            format!(
                "complexity {complexity:.2} >= {:.2}, band {band}",
                config.complexity.threshold
            ),
        )
    } else {
        (
            ExecutionMode::Sequential,
            1,
            format!(
                "complexity {complexity:.2} < {:.2}, running sequentially",
                config.complexity.threshold
            ),
        )
    };

    let worker_count = if mode == ExecutionMode::Sequential {
        1
    } else {
        base_count
            .saturating_add(growth)
            .min(config.max_workers)
            .max(1)
    };
    let reason = if growth > 0 && mode != ExecutionMode::Sequential {
        format!("{reason}; retry {attempt} adds {growth} worker(s)")
    } else {
        reason
    };

    RoutingDecision {
        mode,
        worker_count,
        complexity,
        complexity_band: band,
        strategy: config.strategy,
        reason,
        attempt,
        decided_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(description: &str, task_type: TaskType) -> Task {
        Task::new(description, task_type).unwrap()
    }

    #[test]
    fn test_complexity_components() {
        let model = ComplexityModel::default();
        let simple = estimate_complexity(&task("fix typo", TaskType::Bug), &model);
        assert!((simple - 13.0).abs() < 1e-9);

        let heavy = estimate_complexity(
            &task(
                "refactor the distributed database migration for security and performance",
                TaskType::Architecture,
            ),
            &model,
        );
        // 35 type + 9 words * 1.5 + 6 keywords * 8.
        assert!((heavy - 96.5).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_low_complexity_runs_sequentially() {
        let decision = decide(&RoutingConfig::default(), 13.0, 1);
        assert_eq!(decision.mode, ExecutionMode::Sequential);
        assert_eq!(decision.worker_count, 1);
    }

    #[test]
    fn test_adaptive_high_complexity_fans_out() {
        let config = RoutingConfig::default();
        let decision = decide(&config, 62.0, 1);
        assert_eq!(decision.mode, ExecutionMode::Concurrent);
        assert_eq!(decision.complexity_band, 4);
        assert_eq!(decision.worker_count, 4);

        let capped = decide(&config, 99.0, 1);
        assert_eq!(capped.worker_count, config.max_workers);
    }

    #[test]
    fn test_tiny_band_width_saturates_instead_of_overflowing() {
        let mut config = RoutingConfig::default();
        config.complexity.band_width = 1e-12;
        let decision = decide(&config, 99.0, 1);
        assert_eq!(decision.complexity_band, u32::MAX);
        assert_eq!(decision.worker_count, config.max_workers);
    }

    #[test]
    fn test_non_adaptive_honors_request() {
        let config = RoutingConfig {
            adaptive: false,
            worker_count: 9,
            max_workers: 4,
            ..Default::default()
        };
        let decision = decide(&config, 0.0, 1);
        assert_eq!(decision.mode, ExecutionMode::Concurrent);
        assert_eq!(decision.worker_count, 4);
    }

    #[test]
    fn test_sequential_always_one_worker() {
        let config = RoutingConfig {
            mode: ExecutionMode::Sequential,
            adaptive: false,
            worker_count: 5,
            ..Default::default()
        };
        assert_eq!(decide(&config, 100.0, 3).worker_count, 1);
    }

    #[test]
    fn test_retry_grows_worker_count() {
        let config = RoutingConfig {
            adaptive: false,
            worker_count: 2,
            max_workers: 3,
            ..Default::default()
        };
        assert_eq!(decide(&config, 0.0, 1).worker_count, 2);
        assert_eq!(decide(&config, 0.0, 2).worker_count, 3);
        assert_eq!(decide(&config, 0.0, 5).worker_count, 3);
    }
}
