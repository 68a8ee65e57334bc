//! Integration tests for the engine façade: wiring, persistence, and
//! lifecycle broadcasts.
#![cfg(unix)]

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::FixedAdapter;
use neosec_core::config::GlobalConfig;
use neosec_core::domain::adapter::{AdapterError, ScanObserver};
use neosec_core::domain::scan::{RunStatus, ScanResult, TaskState};
use neosec_core::domain::target::Target;
use neosec_core::WorkflowSpec;
use neosec_orchestrator::{EngineError, ExtensionBus, ScanEngine};

/// Observer that records every lifecycle event it sees.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl ScanObserver for RecordingObserver {
    fn observer_name(&self) -> &str {
        "recording"
    }

    async fn on_scan_start(&self, workflow: &str, target: &Target) -> Result<(), AdapterError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("scan_start:{workflow}:{target}"));
        Ok(())
    }

    async fn on_task_start(&self, task_id: &str) -> Result<(), AdapterError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("task_start:{task_id}"));
        Ok(())
    }

    async fn on_task_complete(
        &self,
        task_id: &str,
        state: TaskState,
    ) -> Result<(), AdapterError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("task_complete:{task_id}:{state}"));
        Ok(())
    }

    async fn on_scan_complete(&self, result: &ScanResult) -> Result<(), AdapterError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("scan_complete:{:?}", result.status));
        Ok(())
    }
}

fn engine_with_observer(
    data_dir: &std::path::Path,
) -> (ScanEngine, Arc<RecordingObserver>) {
    let mut bus = ExtensionBus::new();
    bus.register_adapter(Arc::new(FixedAdapter::new("echo", &["/bin/echo", "hi"])))
        .unwrap();
    let observer = Arc::new(RecordingObserver::default());
    bus.register_observer(observer.clone());

    let config = GlobalConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    (ScanEngine::new(Arc::new(bus), Arc::new(config)), observer)
}

const SINGLE_TASK: &str = "name: single\ntasks:\n  - id: only\n    tool: echo\n";

#[tokio::test]
async fn run_persists_report_and_raw_captures() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_with_observer(dir.path());
    let workflow = WorkflowSpec::from_yaml(SINGLE_TASK).unwrap();

    let result = engine
        .run(&workflow, "192.0.2.5", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);

    let report = dir
        .path()
        .join("reports")
        .join(format!("{}.json", result.run_id));
    assert!(report.is_file(), "missing report at {}", report.display());
    let parsed: ScanResult =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(parsed.run_id, result.run_id);
    assert_eq!(parsed.tasks.len(), 1);

    let raw = dir
        .path()
        .join("raw_outputs")
        .join(result.run_id.to_string());
    assert_eq!(std::fs::read(raw.join("only.stdout")).unwrap(), b"hi\n");
    assert!(raw.join("only.stderr").is_file());
}

#[tokio::test]
async fn lifecycle_events_fire_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, observer) = engine_with_observer(dir.path());
    let workflow = WorkflowSpec::from_yaml(SINGLE_TASK).unwrap();

    engine
        .run(&workflow, "192.0.2.5", CancellationToken::new())
        .await
        .unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "scan_start:single:192.0.2.5",
            "task_start:only",
            "task_complete:only:succeeded",
            "scan_complete:Succeeded",
        ]
    );
}

#[tokio::test]
async fn hostile_target_is_rejected_before_anything_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, observer) = engine_with_observer(dir.path());
    let workflow = WorkflowSpec::from_yaml(SINGLE_TASK).unwrap();

    let err = engine
        .run(&workflow, "192.0.2.5; rm -rf /", CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Target(_)));
    assert!(observer.events.lock().unwrap().is_empty());

    // Nothing was persisted either.
    assert!(!dir.path().join("reports").exists());
}

#[tokio::test]
async fn list_tools_and_dependency_validation_cover_registered_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = engine_with_observer(dir.path());

    let tools = engine.list_tools(None);
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");

    // The stub declares no binaries, so validation reports an empty probe
    // list rather than a failure.
    let report = engine.validate_dependencies();
    assert_eq!(report.len(), 1);
    assert!(report["echo"].is_empty());
}
