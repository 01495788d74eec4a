//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sdlc_brain::adapters::memory::{
    InMemoryApprovalRepository, InMemoryCheckpointStore, InMemoryPatternRepository,
};
use sdlc_brain::adapters::sqlite::{
    initialize_database, database_url, SqliteApprovalRepository, SqliteCheckpointStore,
    SqlitePatternRepository,
};
use sdlc_brain::adapters::workers::ScriptedWorker;
use sdlc_brain::domain::models::{
    ExecutionMode, LearnerConfig, RetryPolicy, RoutingConfig, WorkflowCheckpoint, WorkflowState,
};
use sdlc_brain::{
    ApprovalRepository, CheckpointStore, ConcurrentExecutor, DomainError, DomainResult, HitlGate,
    Learner, PatternRepository, TaskRouter, WorkerRegistry, WorkflowStateManager,
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a temporary test database
///
/// Returns the path to a SQLite database file in a temporary directory.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let db_path = dir.path().join("brain.db");
    (dir, db_path)
}

/// Open and migrate the SQLite database at `path`.
pub async fn open_db(path: &std::path::Path) -> SqlitePool {
    initialize_database(&database_url(path), None)
        .await
        .expect("Failed to open test database")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A fully wired router plus handles to the services behind it.
pub struct Harness {
    pub router: TaskRouter,
    pub states: Arc<WorkflowStateManager>,
    pub gate: Arc<HitlGate>,
    pub learner: Arc<Learner>,
}

impl Harness {
    pub fn build(
        checkpoints: Arc<dyn CheckpointStore>,
        approvals: Arc<dyn ApprovalRepository>,
        patterns: Arc<dyn PatternRepository>,
        worker: ScriptedWorker,
    ) -> Self {
        let states = Arc::new(WorkflowStateManager::new(checkpoints));
        let gate = Arc::new(HitlGate::new(approvals, states.clone()));
        let learner = Arc::new(Learner::new(patterns, &LearnerConfig::default()));
        let router = TaskRouter::new(
            states.clone(),
            ConcurrentExecutor::new(8),
            WorkerRegistry::new(Arc::new(worker)),
            learner.clone(),
            gate.clone(),
        );
        Self {
            router,
            states,
            gate,
            learner,
        }
    }

    /// Harness backed by in-memory adapters.
    pub fn in_memory(worker: ScriptedWorker) -> Self {
        Self::build(
            Arc::new(InMemoryCheckpointStore::new()),
            Arc::new(InMemoryApprovalRepository::new()),
            Arc::new(InMemoryPatternRepository::new()),
            worker,
        )
    }

    /// Harness backed by SQLite repositories sharing one pool.
    pub fn sqlite(pool: SqlitePool, worker: ScriptedWorker) -> Self {
        Self::build(
            Arc::new(SqliteCheckpointStore::new(pool.clone())),
            Arc::new(SqliteApprovalRepository::new(pool.clone())),
            Arc::new(SqlitePatternRepository::new(pool)),
            worker,
        )
    }
}

/// Non-adaptive routing with short timeouts, suitable for tests.
pub fn routing(mode: ExecutionMode, worker_count: u32) -> RoutingConfig {
    RoutingConfig {
        mode,
        worker_count,
        adaptive: false,
        worker_timeout: Duration::from_millis(200),
        retry: RetryPolicy::none(),
        ..RoutingConfig::default()
    }
}

/// Checkpoint store that fails every append once a workflow reaches `fail_from_version`.
pub struct FailingCheckpointStore {
    inner: InMemoryCheckpointStore,
    fail_from_version: u64,
}

impl FailingCheckpointStore {
    pub fn new(fail_from_version: u64) -> Self {
        Self {
            inner: InMemoryCheckpointStore::new(),
            fail_from_version,
        }
    }
}

#[async_trait]
impl CheckpointStore for FailingCheckpointStore {
    async fn append(&self, checkpoint: &WorkflowCheckpoint) -> DomainResult<()> {
        if checkpoint.version >= self.fail_from_version {
            return Err(DomainError::Persistence("disk I/O error".to_string()));
        }
        self.inner.append(checkpoint).await
    }

    async fn latest(&self, workflow_id: Uuid) -> DomainResult<Option<WorkflowCheckpoint>> {
        self.inner.latest(workflow_id).await
    }

    async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<WorkflowCheckpoint>> {
        self.inner.history(workflow_id).await
    }

    async fn latest_in_state(&self, state: WorkflowState) -> DomainResult<Vec<WorkflowCheckpoint>> {
        self.inner.latest_in_state(state).await
    }
}
