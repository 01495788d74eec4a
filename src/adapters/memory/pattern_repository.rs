//! In-memory pattern repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Pattern, PatternKind};
use crate::domain::ports::PatternRepository;

/// Patterns held in a map, for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPatternRepository {
    patterns: Arc<RwLock<BTreeMap<(PatternKind, String), Pattern>>>,
}

impl InMemoryPatternRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternRepository for InMemoryPatternRepository {
    async fn insert(&self, pattern: &Pattern) -> DomainResult<()> {
        let mut patterns = self.patterns.write().await;
        let key = (pattern.kind, pattern.signature.clone());
        if patterns.contains_key(&key) {
            return Err(DomainError::Persistence(format!(
                "pattern ({}, {}) already exists",
                pattern.kind, pattern.signature
            )));
        }
        patterns.insert(key, pattern.clone());
        Ok(())
    }

    async fn update(&self, pattern: &Pattern) -> DomainResult<()> {
        let mut patterns = self.patterns.write().await;
        match patterns
            .values_mut()
            .find(|existing| existing.id == pattern.id)
        {
            Some(existing) => {
                existing.description.clone_from(&pattern.description);
                existing.context.clone_from(&pattern.context);
                existing.occurrence_count = pattern.occurrence_count;
                existing.last_seen_at = pattern.last_seen_at;
                Ok(())
            }
            None => Err(DomainError::Persistence(format!(
                "pattern {} does not exist",
                pattern.id
            ))),
        }
    }

    async fn find_by_signature(
        &self,
        kind: PatternKind,
        signature: &str,
    ) -> DomainResult<Option<Pattern>> {
        let patterns = self.patterns.read().await;
        Ok(patterns.get(&(kind, signature.to_string())).cloned())
    }

    async fn list(&self, kind: Option<PatternKind>) -> DomainResult<Vec<Pattern>> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .values()
            .filter(|p| kind.map_or(true, |k| p.kind == k))
            .cloned()
            .collect())
    }
}
