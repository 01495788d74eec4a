//! Records produced when two synthesis strategies are compared on the same
//! worker results.

use serde::{Deserialize, Serialize};

use super::score::Score;
use super::synthesis::{SynthesisResult, SynthesisStrategy};

/// Which candidate won an A/B comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbWinner {
    A,
    B,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbCandidate {
    pub strategy: SynthesisStrategy,
    pub synthesis: SynthesisResult,
    pub score: Score,
}

/// Both candidates of an A/B comparison and which one won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestResult {
    pub candidate_a: AbCandidate,
    pub candidate_b: AbCandidate,
    pub winner: AbWinner,
    /// Absolute difference between the two final scores.
    pub margin: f64,
}

impl AbTestResult {
    /// The candidate that won.
    pub fn winning(&self) -> &AbCandidate {
        match self.winner {
            AbWinner::A => &self.candidate_a,
            AbWinner::B => &self.candidate_b,
        }
    }

    /// The candidate that lost.
    pub fn losing(&self) -> &AbCandidate {
        match self.winner {
            AbWinner::A => &self.candidate_b,
            AbWinner::B => &self.candidate_a,
        }
    }
}
