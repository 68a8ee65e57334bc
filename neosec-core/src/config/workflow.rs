//! Workflow definitions
//!
//! A workflow YAML file declares the task DAG:
//!
//! ```yaml
//! name: full-recon
//! description: port scan, then probe web services
//! global_timeout: 3600
//! tasks:
//!   - id: portscan
//!     tool: nmap
//!     options:
//!       ports: "1-1024"
//!   - id: webprobe
//!     tool: httpx
//!     depends_on: [portscan]
//! ```
//!
//! Parsing validates structure only (unique ids, known dependency ids, no
//! self-loops). Cycle detection across the whole graph is the scheduler's
//! job, where a topological sort is needed anyway.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::adapter::OptionMap;

const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 3600;

fn default_global_timeout() -> u64 {
    DEFAULT_GLOBAL_TIMEOUT_SECS
}

/// One task node of the workflow DAG. Immutable after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique within the workflow.
    pub id: String,
    /// Must match a registered adapter's canonical name.
    pub tool: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Overrides the run's default target when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Per-task timeout in seconds; overrides the tool default and the
    /// workflow global.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub options: OptionMap,
}

/// A parsed and structurally validated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cap on the whole run, in seconds.
    #[serde(default = "default_global_timeout")]
    pub global_timeout: u64,
    pub tasks: Vec<TaskSpec>,
}

impl WorkflowSpec {
    /// Parse a workflow from YAML text and validate its structure.
    pub fn from_yaml(content: &str) -> Result<Self, WorkflowError> {
        let spec: Self = serde_yml::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a workflow from a YAML file.
    pub fn load(path: &Path) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Distinct tool names referenced by the workflow, in first-use order.
    pub fn referenced_tools(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.tasks
            .iter()
            .filter(|t| seen.insert(t.tool.as_str()))
            .map(|t| t.tool.as_str())
            .collect()
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::MissingName);
        }
        if self.tasks.is_empty() {
            return Err(WorkflowError::NoTasks {
                workflow: self.name.clone(),
            });
        }
        if self.global_timeout == 0 {
            return Err(WorkflowError::ZeroTimeout {
                workflow: self.name.clone(),
            });
        }

        let mut ids = BTreeSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty() {
                return Err(WorkflowError::EmptyTaskId {
                    workflow: self.name.clone(),
                });
            }
            if !ids.insert(task.id.as_str()) {
                return Err(WorkflowError::DuplicateTaskId {
                    task_id: task.id.clone(),
                });
            }
            if task.timeout == Some(0) {
                return Err(WorkflowError::ZeroTaskTimeout {
                    task_id: task.id.clone(),
                });
            }
        }

        for task in &self.tasks {
            for dep in &task.depends_on {
                if dep == &task.id {
                    return Err(WorkflowError::SelfDependency {
                        task_id: task.id.clone(),
                    });
                }
                if !ids.contains(dep.as_str()) {
                    return Err(WorkflowError::UnknownDependency {
                        task_id: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Workflow parsing or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workflow YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("workflow has no name")]
    MissingName,

    #[error("workflow '{workflow}' declares no tasks")]
    NoTasks { workflow: String },

    #[error("workflow '{workflow}' has a zero global timeout")]
    ZeroTimeout { workflow: String },

    #[error("workflow '{workflow}' contains a task with an empty id")]
    EmptyTaskId { workflow: String },

    #[error("duplicate task id '{task_id}'")]
    DuplicateTaskId { task_id: String },

    #[error("task '{task_id}' has a zero timeout")]
    ZeroTaskTimeout { task_id: String },

    #[error("task '{task_id}' depends on itself")]
    SelfDependency { task_id: String },

    #[error("task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    /// A dependency cycle found during scheduling, naming one task on it.
    #[error("workflow contains a dependency cycle through task '{task_id}'")]
    Cycle { task_id: String },
}
