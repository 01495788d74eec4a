//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - CheckpointStore: versioned workflow checkpoints
//! - PatternRepository: learned patterns
//! - ApprovalRepository: human approval gates
//! - WorkerExecution: the opaque role execution behind each worker

pub mod approval_repository;
pub mod checkpoint_store;
pub mod pattern_repository;
pub mod worker_execution;

pub use approval_repository::ApprovalRepository;
pub use checkpoint_store::CheckpointStore;
pub use pattern_repository::PatternRepository;
pub use worker_execution::WorkerExecution;
