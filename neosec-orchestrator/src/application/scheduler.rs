//! DAG scheduler
//!
//! Drives one workflow run: validates the graph and the referenced tools,
//! then repeatedly extracts the set of tasks whose dependencies have all
//! succeeded and runs that layer concurrently through the executor pool.
//!
//! State discipline: the task state table and the asset/vulnerability
//! aggregate are owned by the driver loop alone. Workers only compute; the
//! driver applies every transition and every merge as layer results come
//! in, so there is a single writer by construction.
//!
//! Failure propagation: when a task ends in any non-Succeeded terminal
//! state, every transitive dependent is skipped without executing.
//! Independent subgraphs keep running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use neosec_core::config::workflow::{TaskSpec, WorkflowError, WorkflowSpec};
use neosec_core::config::GlobalConfig;
use neosec_core::domain::adapter::{BinaryProbe, CommandRequest, ParsedOutput, RawOutput};
use neosec_core::domain::asset::Asset;
use neosec_core::domain::scan::{RunStatus, ScanResult, TaskRecord, TaskState};
use neosec_core::domain::target::{Target, TargetError};
use neosec_core::domain::vulnerability::Vulnerability;
use neosec_exec::{CommandSpec, ExecutorPool, TerminalStatus};

use crate::domain::graph::TaskGraph;
use crate::infrastructure::bus::{BusError, ExtensionBus};
use crate::infrastructure::report_store::RawCaptureSink;

const STDERR_EXCERPT_LEN: usize = 240;

/// Executes validated workflows. Collaborators are injected at
/// construction; the scheduler itself is stateless between runs.
pub struct Scheduler {
    bus: Arc<ExtensionBus>,
    pool: ExecutorPool,
    config: Arc<GlobalConfig>,
    raw_sink: Option<Arc<dyn RawCaptureSink>>,
}

/// What one worker hands back to the driver loop.
struct TaskCompletion {
    task_id: String,
    state: TaskState,
    exit_code: Option<i32>,
    error: Option<String>,
    truncated: bool,
    parsed: Option<ParsedOutput>,
}

impl Scheduler {
    pub fn new(bus: Arc<ExtensionBus>, pool: ExecutorPool, config: Arc<GlobalConfig>) -> Self {
        Self {
            bus,
            pool,
            config,
            raw_sink: None,
        }
    }

    /// Attach a sink for per-task raw captures.
    pub fn with_raw_sink(mut self, sink: Arc<dyn RawCaptureSink>) -> Self {
        self.raw_sink = Some(sink);
        self
    }

    /// Run a workflow against a default target.
    ///
    /// Pre-validation errors (cycle, unknown tool, missing binary, invalid
    /// task target) reject the run before any process is spawned.
    pub async fn run(
        &self,
        spec: &WorkflowSpec,
        default_target: &Target,
        cancel: CancellationToken,
    ) -> Result<ScanResult, SchedulerError> {
        let graph = TaskGraph::build(spec)?;
        let binaries = self.validate_tools(spec)?;
        let targets = resolve_targets(spec, default_target)?;

        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        info!(run_id = %run_id, workflow = %spec.name, target = %default_target, "run started");

        // Child token: cancelled by the caller or by the global timeout.
        let run_cancel = cancel.child_token();
        let watchdog = {
            let run_cancel = run_cancel.clone();
            let global = Duration::from_secs(spec.global_timeout);
            tokio::spawn(async move {
                tokio::time::sleep(global).await;
                warn!("global timeout expired, cancelling remaining tasks");
                run_cancel.cancel();
            })
        };

        let mut states: HashMap<&str, TaskState> = spec
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), TaskState::Pending))
            .collect();
        let mut records: HashMap<&str, TaskRecord> = spec
            .tasks
            .iter()
            .map(|t| {
                (
                    t.id.as_str(),
                    TaskRecord {
                        task_id: t.id.clone(),
                        tool: t.tool.clone(),
                        state: TaskState::Pending,
                        started_at: None,
                        finished_at: None,
                        exit_code: None,
                        error: None,
                        output_truncated: false,
                    },
                )
            })
            .collect();

        let mut assets: Vec<Asset> = Vec::new();
        let mut vulnerabilities: Vec<Vulnerability> = Vec::new();

        loop {
            // Cooperative cancellation point, between state transitions.
            if run_cancel.is_cancelled() {
                for task in &spec.tasks {
                    let state = states[task.id.as_str()];
                    if !state.is_terminal() {
                        apply_transition(&mut states, &mut records, &task.id, TaskState::Cancelled);
                        self.bus
                            .emit_task_complete(&task.id, TaskState::Cancelled)
                            .await;
                    }
                }
                break;
            }

            // Propagate failures: a pending task with a non-Succeeded
            // terminal dependency is skipped, transitively.
            let mut skipped_any = false;
            for task in &spec.tasks {
                if states[task.id.as_str()] != TaskState::Pending {
                    continue;
                }
                let doomed = graph.dependencies_of(&task.id).iter().any(|dep| {
                    let dep_state = states[*dep];
                    dep_state.is_terminal() && dep_state != TaskState::Succeeded
                });
                if doomed {
                    debug!(task_id = %task.id, "skipping task: upstream did not succeed");
                    apply_transition(&mut states, &mut records, &task.id, TaskState::Skipped);
                    self.bus
                        .emit_task_complete(&task.id, TaskState::Skipped)
                        .await;
                    skipped_any = true;
                }
            }
            if skipped_any {
                continue;
            }

            // Extract the next layer: pending tasks with all deps succeeded.
            let layer: Vec<&TaskSpec> = spec
                .tasks
                .iter()
                .filter(|t| states[t.id.as_str()] == TaskState::Pending)
                .filter(|t| {
                    graph
                        .dependencies_of(&t.id)
                        .iter()
                        .all(|dep| states[*dep] == TaskState::Succeeded)
                })
                .collect();

            if layer.is_empty() {
                // Every remaining pending task is waiting on a task in this
                // or a later round; with no layer to run, the run is done.
                break;
            }

            let mut join_set: JoinSet<TaskCompletion> = JoinSet::new();
            for task in layer {
                apply_transition(&mut states, &mut records, &task.id, TaskState::Ready);
                self.bus.emit_task_start(&task.id).await;
                apply_transition(&mut states, &mut records, &task.id, TaskState::Running);
                if let Some(record) = records.get_mut(task.id.as_str()) {
                    record.started_at = Some(chrono::Utc::now());
                }

                let worker = TaskWorker {
                    bus: Arc::clone(&self.bus),
                    pool: self.pool.clone(),
                    raw_sink: self.raw_sink.clone(),
                    run_id,
                    task: task.clone(),
                    target: targets[task.id.as_str()].clone(),
                    binary: binaries[task.tool.as_str()].clone(),
                    timeout: self.effective_timeout(task, spec),
                    capture_cap: self.config.max_capture_bytes,
                    cancel: run_cancel.clone(),
                };
                join_set.spawn(worker.execute());
            }

            // Layer barrier: apply results as they land, in completion order.
            while let Some(joined) = join_set.join_next().await {
                let completion = match joined {
                    Ok(completion) => completion,
                    Err(err) => {
                        warn!(error = %err, "task worker panicked");
                        continue;
                    }
                };

                if let Some(parsed) = completion.parsed {
                    assets.extend(parsed.assets);
                    vulnerabilities.extend(parsed.vulnerabilities);
                }
                apply_transition(&mut states, &mut records, &completion.task_id, completion.state);
                if let Some(record) = records.get_mut(completion.task_id.as_str()) {
                    record.finished_at = Some(chrono::Utc::now());
                    record.exit_code = completion.exit_code;
                    record.error = completion.error;
                    record.output_truncated = completion.truncated;
                }
                self.bus
                    .emit_task_complete(&completion.task_id, completion.state)
                    .await;
            }
        }

        watchdog.abort();

        let all_succeeded = spec
            .tasks
            .iter()
            .all(|t| states[t.id.as_str()] == TaskState::Succeeded);
        let status = if all_succeeded {
            RunStatus::Succeeded
        } else if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::PartialFailure
        };

        let tasks: Vec<TaskRecord> = spec
            .tasks
            .iter()
            .map(|t| records.remove(t.id.as_str()).expect("record for every task"))
            .collect();

        info!(run_id = %run_id, status = ?status, "run finished");
        Ok(ScanResult {
            run_id,
            workflow: spec.name.clone(),
            target: default_target.to_string(),
            status,
            started_at,
            finished_at: chrono::Utc::now(),
            tasks,
            assets,
            vulnerabilities,
        })
    }

    /// Every referenced tool must have a registered adapter whose required
    /// binaries are all present. Returns the primary binary per tool.
    fn validate_tools(
        &self,
        spec: &WorkflowSpec,
    ) -> Result<HashMap<String, std::path::PathBuf>, SchedulerError> {
        let mut binaries = HashMap::new();
        for tool in spec.referenced_tools() {
            let adapter = self.bus.adapter(tool)?;
            let descriptor = adapter.descriptor();
            let explicit = self
                .config
                .tool(tool)
                .and_then(|t| t.binary_path.as_deref());
            for binary in &descriptor.required_binaries {
                let probe = BinaryProbe::resolve(binary, explicit);
                if !probe.available {
                    return Err(SchedulerError::Bus(BusError::BinaryMissing {
                        tool: tool.to_string(),
                        binary: binary.clone(),
                    }));
                }
            }
            binaries.insert(
                tool.to_string(),
                self.bus.primary_binary(tool, &self.config)?,
            );
        }
        Ok(binaries)
    }

    /// Timeout precedence: task override > tool default > workflow global.
    fn effective_timeout(&self, task: &TaskSpec, spec: &WorkflowSpec) -> Duration {
        let secs = task
            .timeout
            .or_else(|| self.config.tool(&task.tool).map(|t| t.timeout_secs))
            .unwrap_or(spec.global_timeout);
        Duration::from_secs(secs)
    }
}

/// Everything one task execution needs, cloned out of the scheduler so the
/// worker owns its data.
struct TaskWorker {
    bus: Arc<ExtensionBus>,
    pool: ExecutorPool,
    raw_sink: Option<Arc<dyn RawCaptureSink>>,
    run_id: Uuid,
    task: TaskSpec,
    target: Target,
    binary: std::path::PathBuf,
    timeout: Duration,
    capture_cap: usize,
    cancel: CancellationToken,
}

impl TaskWorker {
    async fn execute(self) -> TaskCompletion {
        let task_id = self.task.id.clone();

        let request = CommandRequest {
            target: &self.target,
            options: &self.task.options,
            binary: &self.binary,
        };
        let tokens = match self.bus.build_command(&self.task.tool, &request) {
            Ok(tokens) => tokens,
            Err(err) => return self.failed(task_id, format!("command construction: {err}")),
        };

        let command = match CommandSpec::new(tokens) {
            Ok(command) => command,
            Err(err) => return self.failed(task_id, format!("command rejected: {err}")),
        };
        let command = command
            .with_timeout(self.timeout)
            .with_capture_limit(self.capture_cap);

        debug!(task_id = %task_id, tool = %self.task.tool, "executing");
        let outcome = self.pool.run(command, self.cancel.clone()).await;

        if let Some(sink) = &self.raw_sink {
            if let Err(err) = sink
                .store_raw(self.run_id, &task_id, &outcome.stdout, &outcome.stderr)
                .await
            {
                warn!(task_id = %task_id, error = %err, "failed to persist raw captures");
            }
        }

        match outcome.status {
            TerminalStatus::Completed if outcome.exit_code == Some(0) => {
                let raw = RawOutput {
                    stdout: &outcome.stdout,
                    stderr: &outcome.stderr,
                    truncated: outcome.truncated(),
                };
                match self.bus.parse_output(&self.task.tool, &raw) {
                    Ok(parsed) => TaskCompletion {
                        task_id,
                        state: TaskState::Succeeded,
                        exit_code: outcome.exit_code,
                        error: None,
                        truncated: outcome.truncated(),
                        parsed: Some(parsed),
                    },
                    Err(err) => TaskCompletion {
                        task_id,
                        state: TaskState::Failed,
                        exit_code: outcome.exit_code,
                        error: Some(format!("output parsing: {err}")),
                        truncated: outcome.truncated(),
                        parsed: None,
                    },
                }
            }
            TerminalStatus::Completed => TaskCompletion {
                task_id,
                state: TaskState::Failed,
                exit_code: outcome.exit_code,
                error: Some(format!(
                    "tool exited with code {}: {}",
                    outcome
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    stderr_excerpt(&outcome.stderr),
                )),
                truncated: outcome.truncated(),
                parsed: None,
            },
            TerminalStatus::TimedOut => TaskCompletion {
                task_id,
                state: TaskState::TimedOut,
                exit_code: None,
                error: Some(format!("timed out after {:?}", self.timeout)),
                truncated: outcome.truncated(),
                parsed: None,
            },
            TerminalStatus::Cancelled => TaskCompletion {
                task_id,
                state: TaskState::Cancelled,
                exit_code: None,
                error: None,
                truncated: outcome.truncated(),
                parsed: None,
            },
            TerminalStatus::SpawnFailed => TaskCompletion {
                task_id,
                state: TaskState::Failed,
                exit_code: None,
                error: Some(format!("spawn failed: {}", stderr_excerpt(&outcome.stderr))),
                truncated: false,
                parsed: None,
            },
        }
    }

    fn failed(&self, task_id: String, error: String) -> TaskCompletion {
        TaskCompletion {
            task_id,
            state: TaskState::Failed,
            exit_code: None,
            error: Some(error),
            truncated: false,
            parsed: None,
        }
    }
}

/// Apply a validated transition to the state table and mirror it into the
/// record. An invalid transition is a scheduler bug; it is logged and the
/// state left untouched rather than corrupted.
fn apply_transition(
    states: &mut HashMap<&str, TaskState>,
    records: &mut HashMap<&str, TaskRecord>,
    task_id: &str,
    next: TaskState,
) {
    let Some(current) = states.get_mut(task_id) else {
        warn!(task_id, "transition for unknown task");
        return;
    };
    match current.transition_to(next) {
        Ok(new_state) => {
            *current = new_state;
            if let Some(record) = records.get_mut(task_id) {
                record.state = new_state;
            }
        }
        Err(err) => warn!(task_id, error = %err, "rejected task transition"),
    }
}

/// Parse per-task target overrides up front so a bad override rejects the
/// run before anything spawns.
fn resolve_targets<'a>(
    spec: &'a WorkflowSpec,
    default_target: &Target,
) -> Result<HashMap<&'a str, Target>, SchedulerError> {
    let mut targets = HashMap::new();
    for task in &spec.tasks {
        let target = match &task.target {
            Some(raw) => Target::parse(raw).map_err(|source| SchedulerError::InvalidTaskTarget {
                task_id: task.id.clone(),
                source,
            })?,
            None => default_target.clone(),
        };
        targets.insert(task.id.as_str(), target);
    }
    Ok(targets)
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_LEN {
        trimmed.to_string()
    } else {
        let mut end = STDERR_EXCERPT_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

/// Run rejection before execution.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("task '{task_id}' has an invalid target: {source}")]
    InvalidTaskTarget {
        task_id: String,
        #[source]
        source: TargetError,
    },
}
