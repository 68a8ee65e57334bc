//! NeoSec Orchestrator - wires workflows, adapters, and the executor
//!
//! The orchestrator owns the run: it validates a workflow as a DAG, drives
//! layered concurrent execution through the executor pool, routes command
//! construction and output parsing to adapters via the extension bus, and
//! aggregates everything into a single [`ScanResult`].
//!
//! ```text
//! ScanEngine
//!     │ validates target + adapter dependencies
//!     ▼
//! Scheduler ── TaskGraph (Kahn layers, failure propagation)
//!     │ per task: bus.build_command → pool.run → bus.parse_output → merge
//!     ▼
//! ScanResult ── ReportStore (raw captures + JSON report)
//! ```
//!
//! [`ScanResult`]: neosec_core::domain::ScanResult

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::engine::{EngineError, ScanEngine};
pub use application::scheduler::{Scheduler, SchedulerError};
pub use domain::graph::TaskGraph;
pub use infrastructure::bus::{BusError, ExtensionBus};
pub use infrastructure::report_store::{RawCaptureSink, ReportStore};
