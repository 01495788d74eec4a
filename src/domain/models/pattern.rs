//! Learned patterns and the recommendations derived from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a learned pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// A task shape that led to a failed or blocked workflow.
    Error,
    /// A task shape that completed, with the accepted output.
    Success,
    /// The winning strategy of an A/B comparison.
    Recommendation,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Recommendation => "recommendation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "success" => Some(Self::Success),
            "recommendation" => Some(Self::Recommendation),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token-set similarity used for approximate pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// |A ∩ B| / |A ∪ B|
    Jaccard,
    /// |A ∩ B| / min(|A|, |B|)
    Overlap,
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        Self::Jaccard
    }
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jaccard => "jaccard",
            Self::Overlap => "overlap",
        }
    }
}

/// A learned regularity. `(kind, signature)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub kind: PatternKind,
    /// Normalized key used for exact and approximate matching.
    pub signature: String,
    pub description: String,
    pub context: BTreeMap<String, String>,
    pub occurrence_count: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Pattern {
    /// A first sighting with `occurrence_count` of 1.
    pub fn new(
        kind: PatternKind,
        signature: impl Into<String>,
        description: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            signature: signature.into(),
            description: description.into(),
            context,
            occurrence_count: 1,
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    /// Fold another sighting of the same signature into this pattern.
    pub fn absorb(&mut self, sighting: Pattern) {
        self.occurrence_count += 1;
        self.last_seen_at = sighting.last_seen_at.max(self.last_seen_at);
        self.description = sighting.description;
        self.context.extend(sighting.context);
    }
}

/// Advice derived from a matching success pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub pattern_id: Uuid,
    pub description: String,
    /// Confidence proxy: how often the pattern was observed.
    pub occurrence_count: u64,
    pub similarity: f64,
}

impl From<(&Pattern, f64)> for Recommendation {
    fn from((pattern, similarity): (&Pattern, f64)) -> Self {
        Self {
            pattern_id: pattern.id,
            description: pattern.description.clone(),
            occurrence_count: pattern.occurrence_count,
            similarity,
        }
    }
}
