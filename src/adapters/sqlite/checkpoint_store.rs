//! SQLite implementation of the CheckpointStore.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CheckpointPayload, WorkflowCheckpoint, WorkflowState};
use crate::domain::ports::CheckpointStore;

/// Append-only checkpoints in `workflow_checkpoints`.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Store over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn append(&self, checkpoint: &WorkflowCheckpoint) -> DomainResult<()> {
        let payload_json = serde_json::to_string(&checkpoint.payload)?;
        let workflow_id = checkpoint.workflow_id.to_string();

        let mut tx = self.pool.begin().await?;

        let (current,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM workflow_checkpoints WHERE workflow_id = ?",
        )
        .bind(&workflow_id)
        .fetch_one(&mut *tx)
        .await?;

        let expected = current as u64 + 1;
        if checkpoint.version != expected {
            return Err(DomainError::VersionConflict {
                workflow_id: checkpoint.workflow_id,
                expected,
                actual: checkpoint.version,
            });
        }

        let inserted = sqlx::query(
            r#"INSERT INTO workflow_checkpoints (workflow_id, version, state, payload, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&workflow_id)
        .bind(checkpoint.version as i64)
        .bind(checkpoint.state.as_str())
        .bind(&payload_json)
        .bind(checkpoint.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await;

        // A concurrent writer in another process may have taken the version.
        if let Err(sqlx::Error::Database(db_err)) = &inserted {
            if db_err.is_unique_violation() {
                return Err(DomainError::VersionConflict {
                    workflow_id: checkpoint.workflow_id,
                    expected,
                    actual: checkpoint.version,
                });
            }
        }
        inserted?;

        tx.commit().await?;
        Ok(())
    }

    async fn latest(&self, workflow_id: Uuid) -> DomainResult<Option<WorkflowCheckpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"SELECT workflow_id, version, state, payload, created_at
               FROM workflow_checkpoints WHERE workflow_id = ?
               ORDER BY version DESC LIMIT 1"#,
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<WorkflowCheckpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"SELECT workflow_id, version, state, payload, created_at
               FROM workflow_checkpoints WHERE workflow_id = ?
               ORDER BY version ASC"#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_in_state(&self, state: WorkflowState) -> DomainResult<Vec<WorkflowCheckpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"SELECT c.workflow_id, c.version, c.state, c.payload, c.created_at
               FROM workflow_checkpoints c
               JOIN (SELECT workflow_id, MAX(version) AS version
                     FROM workflow_checkpoints GROUP BY workflow_id) latest
                 ON latest.workflow_id = c.workflow_id AND latest.version = c.version
               WHERE c.state = ?
               ORDER BY c.created_at ASC"#,
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    workflow_id: String,
    version: i64,
    state: String,
    payload: String,
    created_at: String,
}

impl TryFrom<CheckpointRow> for WorkflowCheckpoint {
    type Error = DomainError;

    fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
        let state = WorkflowState::from_str(&row.state).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid workflow state: {}", row.state))
        })?;
        let payload: CheckpointPayload = serde_json::from_str(&row.payload)?;

        Ok(WorkflowCheckpoint {
            workflow_id: parse_uuid(&row.workflow_id)?,
            version: row.version as u64,
            state,
            payload,
            timestamp: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Task, TaskType};

    async fn setup_store() -> SqliteCheckpointStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteCheckpointStore::new(pool)
    }

    fn initial() -> WorkflowCheckpoint {
        let task = Task::new("add rate limiting to the API", TaskType::Feature).unwrap();
        WorkflowCheckpoint::initial(Uuid::new_v4(), task)
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = setup_store().await;
        let first = initial();
        store.append(&first).await.unwrap();

        let second = first.successor(WorkflowState::Routing, first.payload.clone());
        store.append(&second).await.unwrap();

        let latest = store.latest(first.workflow_id).await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.state, WorkflowState::Routing);
        assert_eq!(latest.payload.task, first.payload.task);

        let history = store.history(first.workflow_id).await.unwrap();
        let versions: Vec<u64> = history.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_append_rejects_gap_and_rewrite() {
        let store = setup_store().await;
        let first = initial();
        store.append(&first).await.unwrap();

        let rewrite = store.append(&first).await;
        assert!(matches!(
            rewrite,
            Err(DomainError::VersionConflict { expected: 2, actual: 1, .. })
        ));

        let mut gap = first.successor(WorkflowState::Routing, first.payload.clone());
        gap.version = 5;
        assert!(matches!(
            store.append(&gap).await,
            Err(DomainError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_latest_in_state_uses_latest_version_only() {
        let store = setup_store().await;

        let parked = initial();
        store.append(&parked).await.unwrap();

        let moved = initial();
        store.append(&moved).await.unwrap();
        let next = moved.successor(WorkflowState::Routing, moved.payload.clone());
        store.append(&next).await.unwrap();

        let created = store.latest_in_state(WorkflowState::Created).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].workflow_id, parked.workflow_id);

        assert!(store.latest(Uuid::new_v4()).await.unwrap().is_none());
    }
}
