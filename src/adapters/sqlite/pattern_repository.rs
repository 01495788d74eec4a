//! SQLite implementation of the PatternRepository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_json_or_default, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Pattern, PatternKind};
use crate::domain::ports::PatternRepository;

/// Learned patterns in the `patterns` table.
#[derive(Clone)]
pub struct SqlitePatternRepository {
    pool: SqlitePool,
}

impl SqlitePatternRepository {
    /// Repository over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, kind, signature, description, context, occurrence_count, first_seen_at, last_seen_at FROM patterns";

#[async_trait]
impl PatternRepository for SqlitePatternRepository {
    async fn insert(&self, pattern: &Pattern) -> DomainResult<()> {
        let context_json = serde_json::to_string(&pattern.context)?;

        sqlx::query(
            r#"INSERT INTO patterns (id, kind, signature, description, context, occurrence_count, first_seen_at, last_seen_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(pattern.id.to_string())
        .bind(pattern.kind.as_str())
        .bind(&pattern.signature)
        .bind(&pattern.description)
        .bind(&context_json)
        .bind(pattern.occurrence_count as i64)
        .bind(pattern.first_seen_at.to_rfc3339())
        .bind(pattern.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, pattern: &Pattern) -> DomainResult<()> {
        let context_json = serde_json::to_string(&pattern.context)?;

        let result = sqlx::query(
            r#"UPDATE patterns SET description = ?, context = ?, occurrence_count = ?, last_seen_at = ?
               WHERE id = ?"#,
        )
        .bind(&pattern.description)
        .bind(&context_json)
        .bind(pattern.occurrence_count as i64)
        .bind(pattern.last_seen_at.to_rfc3339())
        .bind(pattern.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Persistence(format!(
                "pattern {} does not exist",
                pattern.id
            )));
        }

        Ok(())
    }

    async fn find_by_signature(
        &self,
        kind: PatternKind,
        signature: &str,
    ) -> DomainResult<Option<Pattern>> {
        let row: Option<PatternRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE kind = ? AND signature = ?"))
                .bind(kind.as_str())
                .bind(signature)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, kind: Option<PatternKind>) -> DomainResult<Vec<Pattern>> {
        let rows: Vec<PatternRow> = match kind {
            Some(kind) => {
                sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE kind = ? ORDER BY signature"))
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY kind, signature"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: String,
    kind: String,
    signature: String,
    description: String,
    context: Option<String>,
    occurrence_count: i64,
    first_seen_at: String,
    last_seen_at: String,
}

impl TryFrom<PatternRow> for Pattern {
    type Error = DomainError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        let kind = PatternKind::from_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid pattern kind: {}", row.kind))
        })?;
        let context: BTreeMap<String, String> = parse_json_or_default(row.context)?;

        Ok(Pattern {
            id: parse_uuid(&row.id)?,
            kind,
            signature: row.signature,
            description: row.description,
            context,
            occurrence_count: row.occurrence_count as u64,
            first_seen_at: parse_datetime(&row.first_seen_at)?,
            last_seen_at: parse_datetime(&row.last_seen_at)?,
        })
    }
}
