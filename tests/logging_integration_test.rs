// Integration test for logging: initializes the global subscriber, so this
// file holds a single test.

use std::fs;

use sdlc_brain::adapters::workers::{ScriptedResponse, ScriptedWorker};
use sdlc_brain::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl, RotationPolicy};
use sdlc_brain::{OutcomeStatus, Task, TaskType};
use tempfile::TempDir;

mod common;

#[test]
fn test_workflow_events_reach_the_log_file() {
    let temp_dir = TempDir::new().unwrap();

    let config = LogConfig {
        level: "info".to_string(),
        format: LogFormat::Json,
        log_dir: Some(temp_dir.path().to_path_buf()),
        enable_stdout: false,
        rotation: RotationPolicy::Never,
    };
    let logger = LoggerImpl::init(&config).unwrap();
    assert!(logger.has_file_output());

    // A second global subscriber is refused.
    assert!(LoggerImpl::init(&config).is_err());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let status = runtime.block_on(async {
        let worker = ScriptedWorker::new("scripted")
            .with_default_response(ScriptedResponse::success("Add null check before dereference"));
        let harness = common::Harness::in_memory(worker);
        let task = Task::new("fix null pointer in parser", TaskType::Bug).unwrap();
        harness
            .router
            .route(
                task,
                &common::routing(sdlc_brain::ExecutionMode::Concurrent, 2),
            )
            .await
            .unwrap()
            .status
    });
    assert_eq!(status, OutcomeStatus::Completed);

    // Dropping the logger flushes the non-blocking writer.
    drop(logger);

    let contents = fs::read_to_string(temp_dir.path().join("brain.log")).unwrap();
    assert!(contents.contains("logger initialized"));
    assert!(contents.contains("routing decided"));
    assert!(contents.contains("workflow finished"));

    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("level").is_some());
        assert!(value.get("fields").is_some());
    }
}
