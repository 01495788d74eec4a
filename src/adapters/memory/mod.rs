//! In-process adapters for ephemeral runs and tests.

pub mod approval_repository;
pub mod checkpoint_store;
pub mod pattern_repository;

pub use approval_repository::InMemoryApprovalRepository;
pub use checkpoint_store::InMemoryCheckpointStore;
pub use pattern_repository::InMemoryPatternRepository;
