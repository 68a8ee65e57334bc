//! Extension bus
//!
//! The registry that connects the core to tool adapters without hard
//! coupling. Two hook families exist:
//!
//! - **Single-responder** (`build_command`, `parse_output`): resolved by
//!   tool-name lookup. Exactly one adapter answers for a tool; an unknown
//!   name or a second registration under the same name is a configuration
//!   error.
//! - **Broadcast** (`scan_start`, `task_start`, `task_complete`,
//!   `scan_complete`): delivered to every observer in registration order. A
//!   failing observer is logged and skipped, never aborting the broadcast.
//!
//! Registration happens once at startup; the bus is immutable afterwards
//! and shared behind an `Arc`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use neosec_core::config::GlobalConfig;
use neosec_core::domain::adapter::{
    AdapterError, BinaryProbe, CommandRequest, ParsedOutput, RawOutput, ScanObserver,
    ToolAdapter, ToolCategory, ToolDescriptor,
};
use neosec_core::domain::scan::{ScanResult, TaskState};
use neosec_core::domain::target::Target;

/// Adapter and observer registry.
#[derive(Default)]
pub struct ExtensionBus {
    adapters: Vec<Arc<dyn ToolAdapter>>,
    by_name: HashMap<String, usize>,
    observers: Vec<Arc<dyn ScanObserver>>,
}

impl ExtensionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its canonical tool name.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ToolAdapter>) -> Result<(), BusError> {
        let name = adapter.name().to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
            return Err(BusError::InvalidToolName { tool: name });
        }
        if self.by_name.contains_key(&name) {
            return Err(BusError::DuplicateTool { tool: name });
        }

        debug!(tool = %name, "adapter registered");
        self.by_name.insert(name, self.adapters.len());
        self.adapters.push(adapter);
        Ok(())
    }

    /// Register a lifecycle observer. Observers are invoked in registration
    /// order.
    pub fn register_observer(&mut self, observer: Arc<dyn ScanObserver>) {
        debug!(observer = observer.observer_name(), "observer registered");
        self.observers.push(observer);
    }

    /// Look up the single adapter responsible for a tool.
    pub fn adapter(&self, tool: &str) -> Result<&Arc<dyn ToolAdapter>, BusError> {
        self.by_name
            .get(tool)
            .map(|&i| &self.adapters[i])
            .ok_or_else(|| BusError::UnknownTool {
                tool: tool.to_string(),
            })
    }

    /// Descriptors of every registered tool, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.adapters.iter().map(|a| a.descriptor()).collect()
    }

    /// Descriptors filtered by category.
    pub fn descriptors_in(&self, category: ToolCategory) -> Vec<ToolDescriptor> {
        self.adapters
            .iter()
            .map(|a| a.descriptor())
            .filter(|d| d.category == category)
            .collect()
    }

    /// Probe every adapter's required binaries, honoring per-tool
    /// `binary_path` overrides from the config.
    pub fn validate_dependencies(
        &self,
        config: &GlobalConfig,
    ) -> HashMap<String, Vec<BinaryProbe>> {
        let mut report = HashMap::new();
        for adapter in &self.adapters {
            let descriptor = adapter.descriptor();
            let explicit = config
                .tool(&descriptor.name)
                .and_then(|t| t.binary_path.as_deref());
            let probes = descriptor
                .required_binaries
                .iter()
                .map(|binary| BinaryProbe::resolve(binary, explicit))
                .collect();
            report.insert(descriptor.name, probes);
        }
        report
    }

    /// Resolved path of a tool's primary (first-declared) binary.
    ///
    /// Tools that declare no binaries get an empty path; their adapters
    /// build absolute token-0 themselves.
    pub fn primary_binary(
        &self,
        tool: &str,
        config: &GlobalConfig,
    ) -> Result<PathBuf, BusError> {
        let adapter = self.adapter(tool)?;
        let descriptor = adapter.descriptor();
        let Some(primary) = descriptor.required_binaries.first() else {
            return Ok(PathBuf::new());
        };

        let explicit = config.tool(tool).and_then(|t| t.binary_path.as_deref());
        let probe = BinaryProbe::resolve(primary, explicit);
        probe.resolved_path.ok_or_else(|| BusError::BinaryMissing {
            tool: tool.to_string(),
            binary: primary.clone(),
        })
    }

    /// Single-responder hook: build the argv for a task.
    pub fn build_command(
        &self,
        tool: &str,
        request: &CommandRequest<'_>,
    ) -> Result<Vec<String>, BusError> {
        let adapter = self.adapter(tool)?;
        adapter
            .build_command(request)
            .map_err(|source| BusError::Adapter {
                tool: tool.to_string(),
                source,
            })
    }

    /// Single-responder hook: parse a task's raw output.
    pub fn parse_output(
        &self,
        tool: &str,
        output: &RawOutput<'_>,
    ) -> Result<ParsedOutput, BusError> {
        let adapter = self.adapter(tool)?;
        adapter
            .parse_output(output)
            .map_err(|source| BusError::Adapter {
                tool: tool.to_string(),
                source,
            })
    }

    // ── Broadcast hooks ──────────────────────────────────────────────────

    pub async fn emit_scan_start(&self, workflow: &str, target: &Target) {
        for observer in &self.observers {
            if let Err(err) = observer.on_scan_start(workflow, target).await {
                warn!(observer = observer.observer_name(), error = %err, "scan_start observer failed");
            }
        }
    }

    pub async fn emit_task_start(&self, task_id: &str) {
        for observer in &self.observers {
            if let Err(err) = observer.on_task_start(task_id).await {
                warn!(observer = observer.observer_name(), error = %err, "task_start observer failed");
            }
        }
    }

    pub async fn emit_task_complete(&self, task_id: &str, state: TaskState) {
        for observer in &self.observers {
            if let Err(err) = observer.on_task_complete(task_id, state).await {
                warn!(observer = observer.observer_name(), error = %err, "task_complete observer failed");
            }
        }
    }

    pub async fn emit_scan_complete(&self, result: &ScanResult) {
        for observer in &self.observers {
            if let Err(err) = observer.on_scan_complete(result).await {
                warn!(observer = observer.observer_name(), error = %err, "scan_complete observer failed");
            }
        }
    }
}

/// Adapter resolution and delegation errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no adapter is registered for tool '{tool}'")]
    UnknownTool { tool: String },

    #[error("an adapter for tool '{tool}' is already registered")]
    DuplicateTool { tool: String },

    #[error("tool name '{tool}' is not lowercase ASCII")]
    InvalidToolName { tool: String },

    #[error("required binary '{binary}' for tool '{tool}' is not available")]
    BinaryMissing { tool: String, binary: String },

    #[error("adapter for tool '{tool}' failed: {source}")]
    Adapter {
        tool: String,
        #[source]
        source: AdapterError,
    },
}
