//! Compliance rules and the violations they produce.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::synthesis::SynthesisResult;
use super::task::Task;

/// Severity of a violation. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// Halts the workflow.
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// A rule that fired against a synthesis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub task_id: Uuid,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    /// Critical violations block the workflow.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Predicate evaluated by a [`Rule`]. Returns `true` when the rule is violated.
pub type RulePredicate = Arc<dyn Fn(&SynthesisResult, &Task) -> bool + Send + Sync>;

/// A compliance rule: a predicate over the synthesis and its task, plus the
/// message reported when it fires.
#[derive(Clone)]
pub struct Rule {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    predicate: RulePredicate,
}

impl Rule {
    /// Rule that reports `message` whenever `predicate` returns true.
    pub fn new<F>(
        id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&SynthesisResult, &Task) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the rule, producing a violation if it fires.
    pub fn evaluate(&self, result: &SynthesisResult, task: &Task) -> Option<Violation> {
        (self.predicate)(result, task).then(|| Violation {
            task_id: task.id,
            rule_id: self.id.clone(),
            severity: self.severity,
            message: self.message.clone(),
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Whether any violation is critical.
pub fn has_critical(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_critical)
}
