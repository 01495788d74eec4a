//! Service layer: the workflow engine's components.
//!
//! Pure services (synthesizer, judge, observer) hold no state; the rest
//! operate through the ports in [`crate::domain::ports`].

pub mod ab_tester;
pub mod concurrent_executor;
pub mod hitl_gate;
pub mod judge;
pub mod keyed_locks;
pub mod learner;
pub mod observer;
pub mod output_synthesizer;
pub mod pattern_store;
pub mod task_router;
pub mod worker_registry;
pub mod workflow_state_manager;

pub use ab_tester::AbTester;
pub use concurrent_executor::ConcurrentExecutor;
pub use hitl_gate::HitlGate;
pub use judge::Judge;
pub use keyed_locks::KeyedLocks;
pub use learner::{Learner, PatternQuery, PatternStats};
pub use observer::{
    compliance_score, default_rules, max_output_length, no_hardcoded_secret, no_placeholders,
    required_metadata, Observer,
};
pub use output_synthesizer::OutputSynthesizer;
pub use pattern_store::PatternStore;
pub use task_router::{decide, estimate_complexity, TaskRouter};
pub use worker_registry::{WorkerRegistry, WORKER_TAG};
pub use workflow_state_manager::WorkflowStateManager;
