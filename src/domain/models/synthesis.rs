//! Merged decision produced from a set of worker results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::worker::WorkerId;

/// How worker outputs are merged into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisStrategy {
    /// Largest group of equivalent outputs wins.
    Consensus,
    /// Lowest succeeded worker id wins.
    FirstSuccess,
    /// Highest aggregate worker weight wins.
    WeightedVote,
}

impl Default for SynthesisStrategy {
    fn default() -> Self {
        Self::Consensus
    }
}

impl SynthesisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::FirstSuccess => "first-success",
            Self::WeightedVote => "weighted-vote",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "consensus" => Some(Self::Consensus),
            "first-success" => Some(Self::FirstSuccess),
            "weighted-vote" => Some(Self::WeightedVote),
            _ => None,
        }
    }
}

impl std::fmt::Display for SynthesisStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single decision chosen from N worker results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub task_id: Uuid,
    pub chosen_output: String,
    pub strategy: SynthesisStrategy,
    /// Workers whose output matched the chosen one, ascending.
    pub contributing_worker_ids: Vec<WorkerId>,
    pub conflict_detected: bool,
}

impl SynthesisResult {
    /// The result used when no worker succeeded.
    pub fn empty(task_id: Uuid, strategy: SynthesisStrategy) -> Self {
        Self {
            task_id,
            chosen_output: String::new(),
            strategy,
            contributing_worker_ids: Vec::new(),
            conflict_detected: true,
        }
    }

    /// No worker produced an output.
    pub fn is_empty(&self) -> bool {
        self.contributing_worker_ids.is_empty()
    }
}
