//! Quality scores and the rubric used to compute them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Completeness of the chosen output.
pub const DIMENSION_COMPLETENESS: &str = "completeness";
/// Hints of compliance problems (hardcoded values, placeholders).
pub const DIMENSION_COMPLIANCE_HINT: &str = "compliance-hint";
/// Output length relative to the configured bounds.
pub const DIMENSION_LENGTH: &str = "length-appropriateness";
/// Agreement between workers.
pub const DIMENSION_CONSENSUS: &str = "consensus";

/// Tolerance used when checking that rubric weights sum to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weights and pass threshold used by the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Dimension name to weight. Weights must sum to 1.0.
    pub weights: BTreeMap<String, f64>,
    /// Minimum final score (0-100) required to pass.
    pub pass_threshold: f64,
}

impl Default for Rubric {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (DIMENSION_COMPLETENESS.to_string(), 0.4),
            (DIMENSION_COMPLIANCE_HINT.to_string(), 0.3),
            (DIMENSION_LENGTH.to_string(), 0.15),
            (DIMENSION_CONSENSUS.to_string(), 0.15),
        ]);
        Self {
            weights,
            pass_threshold: 70.0,
        }
    }
}

impl Rubric {
    /// Rubric from `(dimension, weight)` pairs. Not validated.
    pub fn new(weights: impl IntoIterator<Item = (String, f64)>, pass_threshold: f64) -> Self {
        Self {
            weights: weights.into_iter().collect(),
            pass_threshold,
        }
    }

    /// Check weights and threshold. Invalid rubrics are programmer errors.
    pub fn validate(&self) -> DomainResult<()> {
        if self.weights.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "rubric must define at least one weight".to_string(),
            ));
        }

        for (name, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(DomainError::InvalidConfiguration(format!(
                    "rubric weight for '{name}' must be a non-negative number, got {weight}"
                )));
            }
        }

        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DomainError::InvalidConfiguration(format!(
                "rubric weights must sum to 1.0, got {sum}"
            )));
        }

        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(DomainError::InvalidConfiguration(format!(
                "pass threshold must be within 0-100, got {}",
                self.pass_threshold
            )));
        }

        Ok(())
    }
}

/// Result of judging one synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub task_id: Uuid,
    pub final_score: f64,
    pub dimension_scores: BTreeMap<String, f64>,
    pub passed_threshold: bool,
}

impl Score {
    /// The zero score attached to workflows where every worker failed.
    pub fn terminal_failure(task_id: Uuid) -> Self {
        Self {
            task_id,
            final_score: 0.0,
            dimension_scores: BTreeMap::new(),
            passed_threshold: false,
        }
    }
}
