//! Task domain model.
//!
//! A task is the immutable unit of work submitted to the router. Every
//! downstream record (worker results, synthesis, checkpoints, patterns)
//! references it by id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Kind of work a task describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bug,
    Security,
    Architecture,
    General,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::General
    }
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Security => "security",
            Self::Architecture => "architecture",
            Self::General => "general",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "feature" => Some(Self::Feature),
            "bug" | "bugfix" => Some(Self::Bug),
            "security" => Some(Self::Security),
            "architecture" => Some(Self::Architecture),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// A unit of work submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub task_type: TaskType,
    /// Arbitrary caller tags. Ordered so serialized snapshots are stable.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task. The description must contain non-whitespace text.
    pub fn new(description: impl Into<String>, task_type: TaskType) -> DomainResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task description cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            description,
            task_type,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        })
    }

    /// Attach a metadata tag.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Metadata entry as a string slice.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Re-check invariants on a task that was built by hand or deserialized.
    pub fn validate(&self) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "task description cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
