//! A/B comparison of two synthesis strategies over the same worker results.

use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AbCandidate, AbTestResult, AbWinner, Rubric, SynthesisStrategy, WorkerResult,
};
use crate::services::judge::Judge;
use crate::services::output_synthesizer::OutputSynthesizer;

/// Runs two synthesis strategies over the same results and keeps the better one.
#[derive(Debug, Clone)]
pub struct AbTester {
    synthesizer: OutputSynthesizer,
    judge: Judge,
}

impl AbTester {
    /// Tester that synthesizes with `synthesizer` and scores with `judge`.
    pub fn new(synthesizer: OutputSynthesizer, judge: Judge) -> Self {
        Self { synthesizer, judge }
    }

    /// Synthesize with both strategies and score each. The higher final score
    /// wins; an exact tie goes to `strategy_a`.
    pub fn compare(
        &self,
        task_id: Uuid,
        results: &[WorkerResult],
        strategy_a: SynthesisStrategy,
        strategy_b: SynthesisStrategy,
        rubric: &Rubric,
    ) -> DomainResult<AbTestResult> {
        let candidate_a = self.candidate(task_id, results, strategy_a, rubric)?;
        let candidate_b = self.candidate(task_id, results, strategy_b, rubric)?;

        let winner = if candidate_b.score.final_score > candidate_a.score.final_score {
            AbWinner::B
        } else {
            AbWinner::A
        };
        let margin = (candidate_a.score.final_score - candidate_b.score.final_score).abs();

        tracing::debug!(
            %task_id,
            strategy_a = strategy_a.as_str(),
            score_a = candidate_a.score.final_score,
            strategy_b = strategy_b.as_str(),
            score_b = candidate_b.score.final_score,
            "strategies compared"
        );

        Ok(AbTestResult {
            candidate_a,
            candidate_b,
            winner,
            margin,
        })
    }

    fn candidate(
        &self,
        task_id: Uuid,
        results: &[WorkerResult],
        strategy: SynthesisStrategy,
        rubric: &Rubric,
    ) -> DomainResult<AbCandidate> {
        let synthesis = self.synthesizer.synthesize(task_id, results, strategy);
        let score = self.judge.score(&synthesis, rubric)?;
        Ok(AbCandidate {
            strategy,
            synthesis,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::Utc;

    fn ok(worker_id: u32, output: &str) -> WorkerResult {
        WorkerResult::success(worker_id, Uuid::nil(), output, 1, Utc::now())
    }

    #[test]
    fn test_identical_candidates_tie_to_a() {
        let results = vec![ok(0, "same answer"), ok(1, "same answer")];
        let tester = AbTester::new(OutputSynthesizer::new(), Judge::default());

        let result = tester
            .compare(
                Uuid::nil(),
                &results,
                SynthesisStrategy::Consensus,
                SynthesisStrategy::FirstSuccess,
                &Rubric::default(),
            )
            .unwrap();

        assert_eq!(result.winner, AbWinner::A);
        assert_eq!(result.margin, 0.0);
        assert_eq!(result.winning().strategy, SynthesisStrategy::Consensus);
    }

    #[test]
    fn test_better_scoring_strategy_wins() {
        // Worker 0 is terse and has a placeholder; workers 1 and 2 agree on a
        // complete answer. First-success picks worker 0, consensus the pair.
        let complete = "## Fix\n- add a null check before dereferencing the token\n- add a regression test covering empty input\nIn summary the parser no longer crashes on empty files.";
        let results = vec![ok(0, "TODO"), ok(1, complete), ok(2, complete)];
        let tester = AbTester::new(OutputSynthesizer::with_reliability(BTreeMap::new()), Judge::default());

        let result = tester
            .compare(
                Uuid::nil(),
                &results,
                SynthesisStrategy::FirstSuccess,
                SynthesisStrategy::Consensus,
                &Rubric::default(),
            )
            .unwrap();

        assert_eq!(result.winner, AbWinner::B);
        assert_eq!(result.winning().synthesis.contributing_worker_ids, vec![1, 2]);
        assert!(result.margin > 0.0);
        assert_eq!(result.losing().strategy, SynthesisStrategy::FirstSuccess);
    }
}
