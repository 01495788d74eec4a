//! Pattern repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Pattern, PatternKind};

/// Storage primitive behind the pattern store.
///
/// Implementations enforce uniqueness of `(kind, signature)`; inserting a
/// duplicate is a persistence error.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn insert(&self, pattern: &Pattern) -> DomainResult<()>;

    /// Overwrite the mutable fields of an existing pattern.
    async fn update(&self, pattern: &Pattern) -> DomainResult<()>;

    async fn find_by_signature(
        &self,
        kind: PatternKind,
        signature: &str,
    ) -> DomainResult<Option<Pattern>>;

    /// All patterns, optionally restricted to one kind.
    async fn list(&self, kind: Option<PatternKind>) -> DomainResult<Vec<Pattern>>;
}
