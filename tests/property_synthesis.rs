use chrono::Utc;
use proptest::prelude::*;
use sdlc_brain::domain::models::{WorkerError, WorkerResult};
use sdlc_brain::services::learner::signature;
use sdlc_brain::{Judge, OutputSynthesizer, Rubric, SynthesisStrategy};
use uuid::Uuid;

const OUTPUTS: [&str; 4] = [
    "Add null check before dereference",
    "add  NULL check before dereference",
    "Rewrite the tokenizer",
    "## Plan\n- guard the pointer\n- add a regression test\nIn summary the crash is fixed.",
];

/// Worker results from (output index, succeeded) pairs; worker ids follow position.
fn results(plan: &[(usize, bool)]) -> Vec<WorkerResult> {
    let task_id = Uuid::nil();
    plan.iter()
        .enumerate()
        .map(|(i, &(output, succeeded))| {
            let worker_id = u32::try_from(i).unwrap();
            if succeeded {
                WorkerResult::success(worker_id, task_id, OUTPUTS[output], 5, Utc::now())
            } else {
                WorkerResult::failure(
                    worker_id,
                    task_id,
                    WorkerError::Failed {
                        message: "boom".to_string(),
                    },
                    5,
                    Utc::now(),
                )
            }
        })
        .collect()
}

fn synthesis_strategy() -> impl Strategy<Value = SynthesisStrategy> {
    prop_oneof![
        Just(SynthesisStrategy::Consensus),
        Just(SynthesisStrategy::FirstSuccess),
        Just(SynthesisStrategy::WeightedVote),
    ]
}

fn worker_plan() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((0..OUTPUTS.len(), any::<bool>()), 0..8)
}

proptest! {
    /// Property: the order results arrive in never changes the synthesis.
    #[test]
    fn prop_synthesis_ignores_arrival_order(
        plan in worker_plan(),
        strategy in synthesis_strategy(),
        seed in any::<u64>(),
    ) {
        let synthesizer = OutputSynthesizer::new();
        let ordered = results(&plan);
        let mut shuffled = ordered.clone();
        if !shuffled.is_empty() {
            let len = shuffled.len();
            shuffled.rotate_left(usize::try_from(seed % len as u64).unwrap());
            shuffled.reverse();
        }

        let a = synthesizer.synthesize(Uuid::nil(), &ordered, strategy);
        let b = synthesizer.synthesize(Uuid::nil(), &shuffled, strategy);
        prop_assert_eq!(a, b);
    }

    /// Property: contributors are succeeded workers in ascending order, and
    /// an empty output means nobody succeeded.
    #[test]
    fn prop_contributors_are_successful_and_sorted(
        plan in worker_plan(),
        strategy in synthesis_strategy(),
    ) {
        let input = results(&plan);
        let synthesis = OutputSynthesizer::new().synthesize(Uuid::nil(), &input, strategy);

        let any_success = input.iter().any(|r| r.succeeded);
        prop_assert_eq!(synthesis.chosen_output.is_empty(), !any_success);
        prop_assert!(synthesis
            .contributing_worker_ids
            .windows(2)
            .all(|w| w[0] < w[1]));
        for id in &synthesis.contributing_worker_ids {
            let result = input.iter().find(|r| r.worker_id == *id).unwrap();
            prop_assert!(result.succeeded);
        }
        if !any_success {
            prop_assert!(synthesis.conflict_detected);
        }
    }

    /// Property: judging is pure and bounded.
    #[test]
    fn prop_judge_is_deterministic_and_bounded(
        plan in worker_plan(),
        strategy in synthesis_strategy(),
    ) {
        let synthesis = OutputSynthesizer::new().synthesize(Uuid::nil(), &results(&plan), strategy);
        let judge = Judge::default();
        let rubric = Rubric::default();

        let first = judge.score(&synthesis, &rubric).unwrap();
        let second = judge.score(&synthesis, &rubric).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!((0.0..=100.0).contains(&first.final_score));
        prop_assert_eq!(first.passed_threshold, first.final_score >= rubric.pass_threshold);
    }

    /// Property: signatures are stable under re-normalization.
    #[test]
    fn prop_signature_is_idempotent(text in "[a-zA-Z .,!-]{0,40}") {
        let once = signature(&text);
        prop_assert_eq!(signature(&once), once.clone());
        prop_assert!(!once.contains("  "));
    }
}
