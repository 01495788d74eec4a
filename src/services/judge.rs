//! Judge: deterministic quality scoring of a synthesis result.
//!
//! Each built-in dimension is scored 0-100 from text heuristics; the final
//! score is the rubric-weighted sum rounded to two decimals. No state, no I/O.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Rubric, Score, SynthesisResult, DIMENSION_COMPLETENESS, DIMENSION_COMPLIANCE_HINT,
    DIMENSION_CONSENSUS, DIMENSION_LENGTH,
};

/// Dimensions the judge knows how to compute.
pub const KNOWN_DIMENSIONS: [&str; 4] = [
    DIMENSION_COMPLETENESS,
    DIMENSION_COMPLIANCE_HINT,
    DIMENSION_LENGTH,
    DIMENSION_CONSENSUS,
];

/// Markers of unfinished work.
pub(crate) const PLACEHOLDER_MARKERS: [&str; 4] = ["todo", "fixme", "tbd", "[placeholder]"];

const CONCLUSION_MARKERS: [&str; 4] = ["summary", "conclusion", "therefore", "result"];

/// Assignments that look like inline credentials.
const SECRET_HINTS: [&str; 6] = [
    "password=",
    "password:",
    "passwd=",
    "secret=",
    "api_key=",
    "apikey=",
];

const LOCAL_ENDPOINT_HINTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Heuristic scorer for synthesized outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judge {
    min_output_chars: usize,
    max_output_chars: usize,
}

impl Default for Judge {
    fn default() -> Self {
        Self::new(20, 20_000)
    }
}

impl Judge {
    /// Judge whose completeness dimension rewards outputs within these bounds.
    pub fn new(min_output_chars: usize, max_output_chars: usize) -> Self {
        Self {
            min_output_chars: min_output_chars.max(1),
            max_output_chars: max_output_chars.max(min_output_chars.max(1)),
        }
    }

    /// Score a synthesis result against a rubric.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the rubric is invalid or weights a
    /// dimension the judge does not compute.
    pub fn score(&self, result: &SynthesisResult, rubric: &Rubric) -> DomainResult<Score> {
        validate_known_dimensions(rubric)?;
        let dimensions = self.dimension_scores(result);
        combine(result.task_id, &dimensions, rubric)
    }

    /// All built-in dimension scores for the result.
    pub fn dimension_scores(&self, result: &SynthesisResult) -> BTreeMap<String, f64> {
        let text = result.chosen_output.as_str();
        BTreeMap::from([
            (DIMENSION_COMPLETENESS.to_string(), round2(completeness(text))),
            (DIMENSION_COMPLIANCE_HINT.to_string(), round2(compliance_hint(text))),
            (DIMENSION_LENGTH.to_string(), round2(self.length_appropriateness(text))),
            (DIMENSION_CONSENSUS.to_string(), round2(consensus(result))),
        ])
    }

    fn length_appropriateness(&self, text: &str) -> f64 {
        let len = text.trim().chars().count();
        if len == 0 {
            return 0.0;
        }
        if len < self.min_output_chars {
            100.0 * len as f64 / self.min_output_chars as f64
        } else if len > self.max_output_chars {
            100.0 * self.max_output_chars as f64 / len as f64
        } else {
            100.0
        }
    }
}

/// Weighted average of precomputed dimension scores.
///
/// # Errors
/// `InvalidConfiguration` when the rubric is invalid or a weighted
/// dimension is missing from `dimension_scores`.
pub fn combine(
    task_id: Uuid,
    dimension_scores: &BTreeMap<String, f64>,
    rubric: &Rubric,
) -> DomainResult<Score> {
    rubric.validate()?;

    let mut total = 0.0;
    for (name, weight) in &rubric.weights {
        let value = dimension_scores.get(name).ok_or_else(|| {
            DomainError::InvalidConfiguration(format!("no score for rubric dimension '{name}'"))
        })?;
        total += weight * value.clamp(0.0, 100.0);
    }

    let final_score = round2(total.clamp(0.0, 100.0));
    Ok(Score {
        task_id,
        final_score,
        dimension_scores: dimension_scores.clone(),
        passed_threshold: final_score >= rubric.pass_threshold,
    })
}

fn validate_known_dimensions(rubric: &Rubric) -> DomainResult<()> {
    if let Some(unknown) = rubric
        .weights
        .keys()
        .find(|name| !KNOWN_DIMENSIONS.contains(&name.as_str()))
    {
        return Err(DomainError::InvalidConfiguration(format!(
            "unknown rubric dimension '{unknown}'"
        )));
    }
    Ok(())
}

fn completeness(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }

    let mut score: f64 = match words {
        0..=9 => 20.0,
        10..=49 => 55.0,
        50..=149 => 75.0,
        150..=299 => 90.0,
        _ => 95.0,
    };

    if has_structure(text) {
        score += 10.0;
    }
    let lower = text.to_lowercase();
    if CONCLUSION_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 5.0;
    }
    score -= 15.0 * placeholder_count(&lower) as f64;

    score.clamp(0.0, 100.0)
}

fn compliance_hint(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let mut score: f64 = 100.0;

    if SECRET_HINTS.iter().any(|h| lower.contains(h)) {
        score -= 40.0;
    }
    if LOCAL_ENDPOINT_HINTS.iter().any(|h| lower.contains(h)) {
        score -= 20.0;
    }
    score -= (10.0 * placeholder_count(&lower) as f64).min(30.0);

    score.clamp(0.0, 100.0)
}

fn consensus(result: &SynthesisResult) -> f64 {
    if result.contributing_worker_ids.is_empty() {
        0.0
    } else if result.conflict_detected {
        40.0
    } else {
        100.0
    }
}

/// Headings, list items or code fences.
fn has_structure(text: &str) -> bool {
    text.lines().map(str::trim_start).any(|line| {
        line.starts_with('#')
            || line.starts_with("- ")
            || line.starts_with("* ")
            || line.starts_with("```")
            || line
                .split_once(". ")
                .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Number of distinct placeholder markers present in lowercased text.
pub(crate) fn placeholder_count(lower: &str) -> usize {
    PLACEHOLDER_MARKERS
        .iter()
        .filter(|m| contains_word(lower, m))
        .count()
}

/// Whole-word containment so that e.g. "todos" or "mastodon" do not match "todo".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        let boundary = |c: Option<char>| c.is_none_or(|c| !c.is_alphanumeric());
        boundary(before) && boundary(after)
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SynthesisStrategy;

    fn result(output: &str) -> SynthesisResult {
        SynthesisResult {
            task_id: Uuid::nil(),
            chosen_output: output.to_string(),
            strategy: SynthesisStrategy::Consensus,
            contributing_worker_ids: vec![0, 1],
            conflict_detected: false,
        }
    }

    #[test]
    fn test_combine_weighted_average() {
        let rubric = Rubric::new(
            [
                (DIMENSION_COMPLETENESS.to_string(), 0.6),
                (DIMENSION_COMPLIANCE_HINT.to_string(), 0.4),
            ],
            70.0,
        );
        let dims = BTreeMap::from([
            (DIMENSION_COMPLETENESS.to_string(), 80.0),
            (DIMENSION_COMPLIANCE_HINT.to_string(), 50.0),
        ]);

        let score = combine(Uuid::nil(), &dims, &rubric).unwrap();
        assert!((score.final_score - 68.0).abs() < 1e-9);
        assert!(!score.passed_threshold);
    }

    #[test]
    fn test_combine_missing_dimension() {
        let rubric = Rubric::new([(DIMENSION_COMPLETENESS.to_string(), 1.0)], 50.0);
        let result = combine(Uuid::nil(), &BTreeMap::new(), &rubric);
        assert!(matches!(result, Err(DomainError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let rubric = Rubric::new(
            [
                (DIMENSION_COMPLETENESS.to_string(), 0.5),
                (DIMENSION_CONSENSUS.to_string(), 0.2),
            ],
            70.0,
        );
        let outcome = Judge::default().score(&result("anything"), &rubric);
        assert!(matches!(outcome, Err(DomainError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let rubric = Rubric::new([("elegance".to_string(), 1.0)], 70.0);
        assert!(Judge::default().score(&result("anything"), &rubric).is_err());
    }

    #[test]
    fn test_score_is_deterministic() {
        let judge = Judge::default();
        let candidate = result("## Plan\n- add null check before dereference\n- cover with a regression test\nIn summary the parser no longer crashes.");
        let first = judge.score(&candidate, &Rubric::default()).unwrap();
        let second = judge.score(&candidate, &Rubric::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.final_score.to_bits(), second.final_score.to_bits());
    }

    #[test]
    fn test_placeholders_and_secrets_lower_scores() {
        let judge = Judge::default();
        let clean = judge.dimension_scores(&result("Connect using the configured credentials from the vault."));
        let dirty = judge.dimension_scores(&result("TODO: connect with password=hunter2 to localhost"));

        assert!(dirty[DIMENSION_COMPLIANCE_HINT] < clean[DIMENSION_COMPLIANCE_HINT]);
        assert!((dirty[DIMENSION_COMPLIANCE_HINT] - 30.0).abs() < 1e-9);
        assert!(dirty[DIMENSION_COMPLETENESS] < clean[DIMENSION_COMPLETENESS]);
    }

    #[test]
    fn test_length_bounds() {
        let judge = Judge::new(10, 20);
        assert!((judge.length_appropriateness("12345") - 50.0).abs() < 1e-9);
        assert!((judge.length_appropriateness("123456789012345") - 100.0).abs() < 1e-9);
        assert!((judge.length_appropriateness(&"x".repeat(40)) - 50.0).abs() < 1e-9);
        assert_eq!(judge.length_appropriateness("   "), 0.0);
    }

    #[test]
    fn test_conflict_lowers_consensus() {
        let mut conflicted = result("a");
        conflicted.conflict_detected = true;
        let dims = Judge::default().dimension_scores(&conflicted);
        assert!((dims[DIMENSION_CONSENSUS] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_placeholder_word_boundaries() {
        assert_eq!(placeholder_count("todo list"), 1);
        assert_eq!(placeholder_count("mastodon todos"), 0);
        assert_eq!(placeholder_count("fixme and tbd"), 2);
    }
}
