//! Output synthesizer: merges N worker results into one decision.
//!
//! Synthesis is pure. Input is sorted by worker id before any strategy runs,
//! so the result does not depend on the order results arrived in.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::models::{SynthesisResult, SynthesisStrategy, WorkerId, WorkerResult};

/// Weight assumed for workers without a configured reliability.
const DEFAULT_WEIGHT: f64 = 1.0;

/// Summed weights closer than this are treated as tied.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Outputs that normalize to the same key, in ascending worker order.
#[derive(Debug)]
struct OutputGroup<'a> {
    members: Vec<&'a WorkerResult>,
    weight: f64,
}

impl OutputGroup<'_> {
    fn min_worker_id(&self) -> WorkerId {
        self.members.first().map_or(WorkerId::MAX, |r| r.worker_id)
    }

    fn representative(&self) -> &str {
        self.members.first().map_or("", |r| r.output.as_str())
    }

    fn worker_ids(&self) -> Vec<WorkerId> {
        self.members.iter().map(|r| r.worker_id).collect()
    }
}

/// Merges worker results with one of the synthesis strategies.
#[derive(Debug, Clone, Default)]
pub struct OutputSynthesizer {
    reliability: BTreeMap<WorkerId, f64>,
}

impl OutputSynthesizer {
    /// Synthesizer where every worker weighs the same.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesizer whose weighted vote uses per-worker reliability weights.
    /// Negative weights count as zero.
    pub fn with_reliability(reliability: BTreeMap<WorkerId, f64>) -> Self {
        Self { reliability }
    }

    /// Merge `results` with `strategy`. Arrival order does not matter.
    pub fn synthesize(
        &self,
        task_id: Uuid,
        results: &[WorkerResult],
        strategy: SynthesisStrategy,
    ) -> SynthesisResult {
        let mut succeeded: Vec<&WorkerResult> = results.iter().filter(|r| r.succeeded).collect();
        succeeded.sort_by_key(|r| r.worker_id);

        if succeeded.is_empty() {
            return SynthesisResult::empty(task_id, strategy);
        }

        match strategy {
            SynthesisStrategy::FirstSuccess => {
                let first = succeeded[0];
                SynthesisResult {
                    task_id,
                    chosen_output: first.output.clone(),
                    strategy,
                    contributing_worker_ids: vec![first.worker_id],
                    conflict_detected: false,
                }
            }
            SynthesisStrategy::Consensus => {
                let groups = self.group(&succeeded);
                let winner = pick(&groups, |g| g.members.len() as f64);
                let conflict = consensus_conflict(&groups);
                finish(task_id, strategy, &groups[winner], conflict)
            }
            SynthesisStrategy::WeightedVote => {
                let groups = self.group(&succeeded);
                let winner = pick(&groups, |g| g.weight);
                let top_weight = groups[winner].weight;
                let tied = groups
                    .iter()
                    .enumerate()
                    .any(|(i, g)| i != winner && (g.weight - top_weight).abs() <= WEIGHT_EPSILON);
                let conflict = tied || consensus_conflict(&groups);
                finish(task_id, strategy, &groups[winner], conflict)
            }
        }
    }

    fn weight_of(&self, worker_id: WorkerId) -> f64 {
        self.reliability
            .get(&worker_id)
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
            .max(0.0)
    }

    /// Group succeeded results by normalized output. Groups are returned in
    /// ascending order of their lowest worker id.
    fn group<'a>(&self, succeeded: &[&'a WorkerResult]) -> Vec<OutputGroup<'a>> {
        let mut by_key: BTreeMap<String, OutputGroup<'a>> = BTreeMap::new();
        for &result in succeeded {
            let group = by_key
                .entry(normalize(&result.output))
                .or_insert_with(|| OutputGroup {
                    members: Vec::new(),
                    weight: 0.0,
                });
            group.members.push(result);
            group.weight += self.weight_of(result.worker_id);
        }

        let mut groups: Vec<OutputGroup<'a>> = by_key.into_values().collect();
        groups.sort_by_key(OutputGroup::min_worker_id);
        groups
    }
}

/// Index of the group with the highest score; ties go to the group with the
/// lowest worker id, which is the earliest in `groups`.
fn pick(groups: &[OutputGroup<'_>], score: impl Fn(&OutputGroup<'_>) -> f64) -> usize {
    let mut best = 0;
    for (i, group) in groups.iter().enumerate().skip(1) {
        if score(group) - score(&groups[best]) > WEIGHT_EPSILON {
            best = i;
        }
    }
    best
}

/// No output shared by two workers while several distinct outputs exist.
fn consensus_conflict(groups: &[OutputGroup<'_>]) -> bool {
    let largest = groups.iter().map(|g| g.members.len()).max().unwrap_or(0);
    largest == 1 && groups.len() > 1
}

fn finish(
    task_id: Uuid,
    strategy: SynthesisStrategy,
    winner: &OutputGroup<'_>,
    conflict_detected: bool,
) -> SynthesisResult {
    SynthesisResult {
        task_id,
        chosen_output: winner.representative().to_string(),
        strategy,
        contributing_worker_ids: winner.worker_ids(),
        conflict_detected,
    }
}

/// Equivalence key: lowercase, whitespace runs collapsed, trimmed.
pub fn normalize(output: &str) -> String {
    output
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
