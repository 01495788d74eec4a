//! SQLite implementation of the ApprovalRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ApprovalGate;
use crate::domain::ports::ApprovalRepository;

/// Approval gates in the `approval_gates` table.
#[derive(Clone)]
pub struct SqliteApprovalRepository {
    pool: SqlitePool,
}

impl SqliteApprovalRepository {
    /// Repository over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRepository for SqliteApprovalRepository {
    async fn insert_if_absent(&self, gate: &ApprovalGate) -> DomainResult<ApprovalGate> {
        sqlx::query(
            r#"INSERT INTO approval_gates (workflow_id, requested_at, approved_at, rejected_at, rejection_reason, approver)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(workflow_id) DO NOTHING"#,
        )
        .bind(gate.workflow_id.to_string())
        .bind(gate.requested_at.to_rfc3339())
        .bind(gate.approved_at.map(|at| at.to_rfc3339()))
        .bind(gate.rejected_at.map(|at| at.to_rfc3339()))
        .bind(gate.rejection_reason.as_deref())
        .bind(gate.approver.as_deref())
        .execute(&self.pool)
        .await?;

        self.get(gate.workflow_id).await?.ok_or_else(|| {
            DomainError::Persistence(format!(
                "approval gate for {} vanished after insert",
                gate.workflow_id
            ))
        })
    }

    async fn get(&self, workflow_id: Uuid) -> DomainResult<Option<ApprovalGate>> {
        let row: Option<ApprovalRow> = sqlx::query_as(
            "SELECT workflow_id, requested_at, approved_at, rejected_at, rejection_reason, approver FROM approval_gates WHERE workflow_id = ?",
        )
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_approved(
        &self,
        workflow_id: Uuid,
        approver: &str,
        approved_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"UPDATE approval_gates SET approved_at = ?, approver = ?
               WHERE workflow_id = ? AND approved_at IS NULL AND rejected_at IS NULL"#,
        )
        .bind(approved_at.to_rfc3339())
        .bind(approver)
        .bind(workflow_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_rejected(
        &self,
        workflow_id: Uuid,
        approver: &str,
        reason: &str,
        rejected_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"UPDATE approval_gates SET rejected_at = ?, rejection_reason = ?, approver = ?
               WHERE workflow_id = ? AND approved_at IS NULL AND rejected_at IS NULL"#,
        )
        .bind(rejected_at.to_rfc3339())
        .bind(reason)
        .bind(approver)
        .bind(workflow_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn pending(&self) -> DomainResult<Vec<ApprovalGate>> {
        let rows: Vec<ApprovalRow> = sqlx::query_as(
            r#"SELECT workflow_id, requested_at, approved_at, rejected_at, rejection_reason, approver FROM approval_gates
               WHERE approved_at IS NULL AND rejected_at IS NULL
               ORDER BY requested_at"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    workflow_id: String,
    requested_at: String,
    approved_at: Option<String>,
    rejected_at: Option<String>,
    rejection_reason: Option<String>,
    approver: Option<String>,
}

impl TryFrom<ApprovalRow> for ApprovalGate {
    type Error = DomainError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        Ok(ApprovalGate {
            workflow_id: parse_uuid(&row.workflow_id)?,
            requested_at: parse_datetime(&row.requested_at)?,
            approved_at: parse_optional_datetime(row.approved_at)?,
            rejected_at: parse_optional_datetime(row.rejected_at)?,
            rejection_reason: row.rejection_reason,
            approver: row.approver,
        })
    }
}
