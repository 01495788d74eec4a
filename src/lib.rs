//! SDLC Brain - workflow orchestration and self-learning engine
//!
//! Takes a task, fans it out to concurrent workers, merges their outputs into
//! one decision, scores and audits that decision, checkpoints every phase so a
//! workflow survives a restart, and learns patterns from finished workflows.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Adapters** (`adapters`): SQLite and in-memory port implementations
//! - **Service Layer** (`services`): router, executor, synthesizer, judge,
//!   observer, state manager, approval gate and learner
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sdlc_brain::adapters::memory::{
//!     InMemoryApprovalRepository, InMemoryCheckpointStore, InMemoryPatternRepository,
//! };
//! use sdlc_brain::{
//!     Config, ConcurrentExecutor, HitlGate, Learner, Task, TaskRouter, TaskType,
//!     WorkerRegistry, WorkflowStateManager,
//! };
//!
//! # async fn run(worker: Arc<dyn sdlc_brain::WorkerExecution>) -> anyhow::Result<()> {
//! let config = Config::default();
//! let states = Arc::new(WorkflowStateManager::new(Arc::new(InMemoryCheckpointStore::new())));
//! let gate = Arc::new(HitlGate::new(Arc::new(InMemoryApprovalRepository::new()), states.clone()));
//! let learner = Arc::new(Learner::new(Arc::new(InMemoryPatternRepository::new()), &config.learner));
//! let router = TaskRouter::new(
//!     states,
//!     ConcurrentExecutor::new(config.executor.max_concurrent_workers),
//!     WorkerRegistry::new(worker),
//!     learner,
//!     gate,
//! );
//!
//! let task = Task::new("fix null pointer in parser", TaskType::Bug)?;
//! let outcome = router.route(task, &config.routing_config()).await?;
//! println!("{}", outcome.status.as_str());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    ApprovalGate, ApprovalOutcome, Config, ExecutionMode, OutcomeStatus, Pattern, PatternKind,
    Recommendation, RoutingConfig, Rubric, Score, SynthesisResult, SynthesisStrategy, Task,
    TaskType, Violation, WorkerResult, WorkflowCheckpoint, WorkflowOutcome, WorkflowState,
};
pub use domain::ports::{ApprovalRepository, CheckpointStore, PatternRepository, WorkerExecution};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::{LogConfig, LoggerImpl};
pub use services::{
    ConcurrentExecutor, HitlGate, Judge, Learner, Observer, OutputSynthesizer, PatternQuery,
    PatternStats, TaskRouter, WorkerRegistry, WorkflowStateManager,
};
