//! Learner: turns finished workflows into patterns and answers similarity
//! queries against them.
//!
//! All writes go through [`Learner::ingest`] and [`Learner::record_experiment`].
//! External tooling gets the read-only [`PatternQuery`] view.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTestResult, LearnerConfig, OutcomeStatus, Pattern, PatternKind, Recommendation,
    SimilarityMetric, Task, WorkflowOutcome,
};
use crate::domain::ports::PatternRepository;
use crate::services::pattern_store::PatternStore;

const STOP_WORDS: [&str; 26] = [
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "with", "for", "and", "or", "but",
    "in", "on", "at", "to", "of", "that", "this", "it", "from", "by", "as", "into",
];

/// Read-only pattern queries.
#[async_trait]
pub trait PatternQuery: Send + Sync {
    /// Patterns of `kind` ranked by similarity to `query`, at most `limit`.
    async fn find_similar(
        &self,
        query: &str,
        kind: PatternKind,
        limit: usize,
    ) -> DomainResult<Vec<Pattern>>;

    /// Best success pattern for the task, if it clears the confidence floor.
    async fn recommend(&self, task: &Task) -> DomainResult<Option<Recommendation>>;
}

/// Pattern counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternStats {
    /// Distinct patterns stored.
    pub total_patterns: usize,
    /// Sightings across all patterns.
    pub total_occurrences: u64,
    /// Distinct patterns per kind. Kinds with none are absent.
    pub by_kind: BTreeMap<PatternKind, usize>,
}

/// Learns from finished workflows and answers similarity queries.
pub struct Learner {
    store: PatternStore,
    similarity: SimilarityMetric,
    confidence_floor: f64,
}

impl Learner {
    /// Learner over `repository` using the configured metric and floor.
    pub fn new(repository: Arc<dyn PatternRepository>, config: &LearnerConfig) -> Self {
        Self {
            store: PatternStore::new(repository),
            similarity: config.similarity,
            confidence_floor: config.confidence_floor,
        }
    }

    /// Record a finished workflow as a success or error pattern.
    ///
    /// # Errors
    /// `ValidationFailed` for outcomes still awaiting approval; storage errors
    /// are propagated.
    pub async fn ingest(&self, outcome: &WorkflowOutcome) -> DomainResult<Pattern> {
        let (kind, description) = match outcome.status {
            OutcomeStatus::Completed => (
                PatternKind::Success,
                outcome
                    .synthesis
                    .as_ref()
                    .map(|s| s.chosen_output.clone())
                    .unwrap_or_default(),
            ),
            OutcomeStatus::Failed | OutcomeStatus::Blocked => {
                (PatternKind::Error, failure_description(outcome))
            }
            OutcomeStatus::AwaitingApproval => {
                return Err(DomainError::ValidationFailed(format!(
                    "workflow {} is awaiting approval and has no outcome to learn from",
                    outcome.workflow_id
                )));
            }
        };

        let mut context = BTreeMap::from([
            ("workflow_id".to_string(), outcome.workflow_id.to_string()),
            ("task_type".to_string(), outcome.task.task_type.as_str().to_string()),
            ("status".to_string(), outcome.status.as_str().to_string()),
            ("attempts".to_string(), outcome.attempts.to_string()),
        ]);
        if let Some(score) = &outcome.score {
            context.insert("final_score".to_string(), format!("{:.2}", score.final_score));
        }
        if let Some(synthesis) = &outcome.synthesis {
            context.insert("strategy".to_string(), synthesis.strategy.as_str().to_string());
        }
        if let Some(routing) = &outcome.routing {
            context.insert("mode".to_string(), routing.mode.as_str().to_string());
            context.insert("worker_count".to_string(), routing.worker_count.to_string());
        }

        let pattern = Pattern::new(kind, signature(&outcome.task.description), description, context);
        let stored = self.store.upsert(pattern).await?;
        tracing::info!(
            workflow_id = %outcome.workflow_id,
            kind = stored.kind.as_str(),
            signature = %stored.signature,
            occurrence_count = stored.occurrence_count,
            "learned from workflow outcome"
        );
        Ok(stored)
    }

    /// Whether the pattern this outcome maps to was last fed by the same
    /// workflow. Used to avoid counting a workflow twice when learning is retried.
    pub async fn has_learned(&self, outcome: &WorkflowOutcome) -> DomainResult<bool> {
        let kind = match outcome.status {
            OutcomeStatus::Completed => PatternKind::Success,
            OutcomeStatus::Failed | OutcomeStatus::Blocked => PatternKind::Error,
            OutcomeStatus::AwaitingApproval => return Ok(false),
        };
        let workflow_id = outcome.workflow_id.to_string();
        Ok(self
            .store
            .get(kind, &signature(&outcome.task.description))
            .await?
            .is_some_and(|p| p.context.get("workflow_id") == Some(&workflow_id)))
    }

    /// Pattern counts over everything learned so far.
    pub async fn stats(&self) -> DomainResult<PatternStats> {
        let mut stats = PatternStats::default();
        for pattern in self.store.list(None).await? {
            stats.total_patterns += 1;
            stats.total_occurrences += pattern.occurrence_count;
            *stats.by_kind.entry(pattern.kind).or_default() += 1;
        }
        Ok(stats)
    }

    /// Record which synthesis strategy won an A/B comparison for this task.
    pub async fn record_experiment(&self, result: &AbTestResult, task: &Task) -> DomainResult<Pattern> {
        let winner = result.winning();
        let loser = result.losing();
        let description = format!(
            "{} outscored {} ({:.2} vs {:.2})",
            winner.strategy, loser.strategy, winner.score.final_score, loser.score.final_score
        );
        let context = BTreeMap::from([
            ("task_type".to_string(), task.task_type.as_str().to_string()),
            ("winning_strategy".to_string(), winner.strategy.as_str().to_string()),
            ("losing_strategy".to_string(), loser.strategy.as_str().to_string()),
            ("margin".to_string(), format!("{:.2}", result.margin)),
        ]);

        self.store
            .upsert(Pattern::new(
                PatternKind::Recommendation,
                signature(&task.description),
                description,
                context,
            ))
            .await
    }

    /// Patterns with non-zero similarity to `query`, best first.
    async fn ranked(
        &self,
        query: &str,
        kind: PatternKind,
        limit: usize,
    ) -> DomainResult<Vec<(Pattern, f64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_signature = signature(query);
        let query_tokens = tokens(&query_signature);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(Pattern, f64)> = self
            .store
            .list(Some(kind))
            .await?
            .into_iter()
            .filter_map(|pattern| {
                let score = similarity(&query_tokens, &tokens(&pattern.signature), self.similarity);
                (score > 0.0).then_some((pattern, score))
            })
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.occurrence_count.cmp(&a.occurrence_count))
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
                .then_with(|| a.signature.cmp(&b.signature))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl PatternQuery for Learner {
    async fn find_similar(
        &self,
        query: &str,
        kind: PatternKind,
        limit: usize,
    ) -> DomainResult<Vec<Pattern>> {
        Ok(self
            .ranked(query, kind, limit)
            .await?
            .into_iter()
            .map(|(pattern, _)| pattern)
            .collect())
    }

    async fn recommend(&self, task: &Task) -> DomainResult<Option<Recommendation>> {
        let top = self
            .ranked(&task.description, PatternKind::Success, 1)
            .await?
            .into_iter()
            .next();

        Ok(top
            .filter(|(_, score)| *score > self.confidence_floor)
            .map(|(pattern, score)| Recommendation::from((&pattern, score))))
    }
}

fn failure_description(outcome: &WorkflowOutcome) -> String {
    let mut parts: Vec<String> = outcome.error.iter().cloned().collect();
    parts.extend(
        outcome
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.rule_id, v.message)),
    );
    if parts.is_empty() {
        format!("workflow {}", outcome.status.as_str().to_lowercase())
    } else {
        parts.join("; ")
    }
}

/// Normalized matching key: lowercase tokens with edge punctuation and stop
/// words removed, joined by single spaces.
pub fn signature(text: &str) -> String {
    let lower = text.to_lowercase();
    let kept: Vec<&str> = lower
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word))
        .collect();

    if kept.is_empty() {
        lower.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        kept.join(" ")
    }
}

fn tokens(signature: &str) -> BTreeSet<&str> {
    signature.split_whitespace().collect()
}

/// Token-set similarity in 0..=1.
pub fn similarity(a: &BTreeSet<&str>, b: &BTreeSet<&str>, metric: SimilarityMetric) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    match metric {
        SimilarityMetric::Jaccard => shared / a.union(b).count() as f64,
        SimilarityMetric::Overlap => shared / a.len().min(b.len()) as f64,
    }
}
