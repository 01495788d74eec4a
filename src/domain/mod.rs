//! Domain layer for the orchestration engine
//!
//! This module contains the core records, the workflow state machine
//! and the port traits that storage and worker adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
