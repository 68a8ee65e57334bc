//! Scan lifecycle: per-task state machine and the aggregated run result
//!
//! [`TaskState`] is owned exclusively by the scheduler; every transition goes
//! through [`TaskState::transition_to`], which rejects moves the state
//! machine does not allow:
//!
//! ```text
//! Pending ──► Ready ──► Running ──► Succeeded | Failed | TimedOut | Cancelled
//!    │          │
//!    └──────────┴─────► Skipped | Cancelled     (dependency failed / run cancelled)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::asset::Asset;
use super::vulnerability::Vulnerability;

/// Lifecycle state of a single workflow task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
    TimedOut,
    Cancelled,
}

impl TaskState {
    /// Whether this state ends the task's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded
                | TaskState::Failed
                | TaskState::Skipped
                | TaskState::TimedOut
                | TaskState::Cancelled
        )
    }

    /// Validate and perform a transition, returning the new state.
    pub fn transition_to(self, next: TaskState) -> Result<TaskState, TransitionError> {
        let allowed = match (self, next) {
            (TaskState::Pending, TaskState::Ready) => true,
            (TaskState::Pending | TaskState::Ready, TaskState::Skipped | TaskState::Cancelled) => {
                true
            }
            (TaskState::Ready, TaskState::Running) => true,
            (
                TaskState::Running,
                TaskState::Succeeded
                | TaskState::Failed
                | TaskState::TimedOut
                | TaskState::Cancelled,
            ) => true,
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
            TaskState::TimedOut => "timed_out",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Rejected task state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid task transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskState,
    pub to: TaskState,
}

/// Final record of one task's execution within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub tool: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code of the underlying process when one ran to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured output was cut at the configured cap.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub output_truncated: bool,
}

impl TaskRecord {
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Overall outcome of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task reached Succeeded.
    Succeeded,
    /// At least one task did not succeed; independent subgraphs still ran.
    PartialFailure,
    /// The run-level cancel signal fired.
    Cancelled,
    /// Pre-execution validation rejected the run.
    Failed,
}

/// The aggregate of one workflow run against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub run_id: Uuid,
    pub workflow: String,
    pub target: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ScanResult {
    /// Highest severity among the run's findings, if any.
    pub fn max_severity(&self) -> Option<super::vulnerability::Severity> {
        self.vulnerabilities.iter().map(|v| v.severity).max()
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}
