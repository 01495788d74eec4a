//! Pattern store: upserts learned patterns keyed by `(kind, signature)`.
//!
//! Writes for the same key are serialized in-process; the repository's
//! uniqueness constraint covers writers in other processes.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Pattern, PatternKind};
use crate::domain::ports::PatternRepository;
use crate::services::keyed_locks::KeyedLocks;

/// Serialized upserts over a [`PatternRepository`].
pub struct PatternStore {
    repository: Arc<dyn PatternRepository>,
    locks: KeyedLocks<(PatternKind, String)>,
}

impl PatternStore {
    /// Store writing through `repository`.
    pub fn new(repository: Arc<dyn PatternRepository>) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
        }
    }

    /// Insert a first sighting, or fold it into the stored pattern with the
    /// same kind and signature. Returns the stored pattern.
    pub async fn upsert(&self, sighting: Pattern) -> DomainResult<Pattern> {
        let key = (sighting.kind, sighting.signature.clone());
        let _guard = self.locks.lock(&key).await;

        if let Some(mut existing) = self
            .repository
            .find_by_signature(sighting.kind, &sighting.signature)
            .await?
        {
            existing.absorb(sighting);
            self.repository.update(&existing).await?;
            tracing::debug!(
                kind = existing.kind.as_str(),
                signature = %existing.signature,
                occurrence_count = existing.occurrence_count,
                "pattern occurrence recorded"
            );
            return Ok(existing);
        }

        match self.repository.insert(&sighting).await {
            Ok(()) => {
                tracing::debug!(
                    kind = sighting.kind.as_str(),
                    signature = %sighting.signature,
                    "new pattern stored"
                );
                Ok(sighting)
            }
            Err(insert_error) => {
                // Another process may have inserted the same key since our lookup.
                let Some(mut existing) = self
                    .repository
                    .find_by_signature(sighting.kind, &sighting.signature)
                    .await?
                else {
                    return Err(insert_error);
                };
                existing.absorb(sighting);
                self.repository.update(&existing).await?;
                Ok(existing)
            }
        }
    }

    /// Exact lookup by key.
    pub async fn get(&self, kind: PatternKind, signature: &str) -> DomainResult<Option<Pattern>> {
        self.repository.find_by_signature(kind, signature).await
    }

    /// Every pattern, or every pattern of `kind`.
    pub async fn list(&self, kind: Option<PatternKind>) -> DomainResult<Vec<Pattern>> {
        self.repository.list(kind).await
    }
}
