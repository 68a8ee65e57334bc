//! Engine façade
//!
//! The one entry point the CLI talks to. The engine owns the wired
//! collaborators (bus, pool, config, report store) — all passed in at
//! construction, none of them global — and turns a (workflow, target) pair
//! into a persisted [`ScanResult`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use neosec_core::config::GlobalConfig;
use neosec_core::domain::adapter::{BinaryProbe, ToolCategory, ToolDescriptor};
use neosec_core::domain::scan::ScanResult;
use neosec_core::domain::target::{Target, TargetError};
use neosec_core::WorkflowSpec;
use neosec_exec::ExecutorPool;

use super::scheduler::{Scheduler, SchedulerError};
use crate::infrastructure::bus::ExtensionBus;
use crate::infrastructure::report_store::ReportStore;

/// Orchestration façade: validate, schedule, persist, notify.
pub struct ScanEngine {
    bus: Arc<ExtensionBus>,
    config: Arc<GlobalConfig>,
    pool: ExecutorPool,
    report_store: Arc<ReportStore>,
}

impl ScanEngine {
    /// Wire an engine from a fully registered bus and loaded config.
    pub fn new(bus: Arc<ExtensionBus>, config: Arc<GlobalConfig>) -> Self {
        let pool = ExecutorPool::new(config.max_concurrent_tasks);
        let report_store = Arc::new(ReportStore::new(config.effective_data_dir()));
        Self {
            bus,
            config,
            pool,
            report_store,
        }
    }

    /// Run one workflow against one target.
    ///
    /// The returned result is also persisted as JSON under the data
    /// directory, alongside each task's raw captures.
    pub async fn run(
        &self,
        workflow: &WorkflowSpec,
        raw_target: &str,
        cancel: CancellationToken,
    ) -> Result<ScanResult, EngineError> {
        let target = Target::parse(raw_target)?;
        info!(workflow = %workflow.name, target = %target, "scan requested");

        self.bus.emit_scan_start(&workflow.name, &target).await;

        let scheduler = Scheduler::new(
            Arc::clone(&self.bus),
            self.pool.clone(),
            Arc::clone(&self.config),
        )
        .with_raw_sink(self.report_store.clone());

        let result = scheduler.run(workflow, &target, cancel).await?;

        if let Err(err) = self.report_store.write_report(&result).await {
            // The run itself finished; a failed report write must not eat it.
            warn!(run_id = %result.run_id, error = %err, "failed to persist report");
        }

        self.bus.emit_scan_complete(&result).await;
        Ok(result)
    }

    /// Registered tools, optionally filtered by category.
    pub fn list_tools(&self, category: Option<ToolCategory>) -> Vec<ToolDescriptor> {
        match category {
            Some(category) => self.bus.descriptors_in(category),
            None => self.bus.descriptors(),
        }
    }

    /// Probe every registered adapter's binaries.
    pub fn validate_dependencies(
        &self,
    ) -> std::collections::HashMap<String, Vec<BinaryProbe>> {
        self.bus.validate_dependencies(&self.config)
    }
}

/// Engine-level failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
