//! Worker execution adapters.

pub mod scripted;

pub use scripted::{ScriptedResponse, ScriptedWorker};
