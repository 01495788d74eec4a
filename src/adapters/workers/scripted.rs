//! Scripted worker for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{Task, WorkerId};
use crate::domain::ports::WorkerExecution;

/// What a scripted worker does when invoked.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    /// Output text when succeeding
    pub output: String,
    /// Error message when failing
    pub error: Option<String>,
    /// Panic instead of returning
    pub panic: bool,
    /// Sleep before answering
    pub delay: Duration,
}

impl Default for ScriptedResponse {
    fn default() -> Self {
        Self {
            output: "Scripted worker completed the task.".to_string(),
            error: None,
            panic: false,
            delay: Duration::ZERO,
        }
    }
}

impl ScriptedResponse {
    /// Succeed with `output`.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    /// Fail with `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Panic inside the worker task.
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            panic: true,
            ..Default::default()
        }
    }

    /// Sleep for `delay` before responding.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Worker whose answers are fixed up front.
///
/// Lookup order per invocation: per-worker override, then the call sequence
/// (nth invocation gets the nth entry), then the default.
pub struct ScriptedWorker {
    name: String,
    default_response: ScriptedResponse,
    sequence: Vec<ScriptedResponse>,
    per_worker: HashMap<WorkerId, ScriptedResponse>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedWorker {
    /// Worker that succeeds with a canned output until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_response: ScriptedResponse::default(),
            sequence: Vec::new(),
            per_worker: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Response used when nothing more specific matches.
    #[must_use]
    pub fn with_default_response(mut self, response: ScriptedResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Response for one worker id, on every call.
    #[must_use]
    pub fn with_worker_response(mut self, worker_id: WorkerId, response: ScriptedResponse) -> Self {
        self.per_worker.insert(worker_id, response);
        self
    }

    /// Responses handed out in call order. Per-worker overrides still win.
    #[must_use]
    pub fn with_sequence(mut self, responses: Vec<ScriptedResponse>) -> Self {
        self.sequence = responses;
        self
    }

    /// Total invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerExecution for ScriptedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _task: &Task, worker_id: WorkerId) -> anyhow::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .per_worker
            .get(&worker_id)
            .or_else(|| self.sequence.get(call))
            .unwrap_or(&self.default_response)
            .clone();

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        if response.panic {
            panic!(
                "{}",
                response.error.as_deref().unwrap_or("scripted worker panicked")
            );
        }

        match response.error {
            Some(error) => Err(anyhow::anyhow!(error)),
            None => Ok(response.output),
        }
    }
}
