//! NeoSec Core - Foundation crate for the NeoSec orchestration framework
//!
//! This crate provides the shared building blocks used by the executor,
//! orchestrator, adapter, and CLI crates:
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed global configuration (TOML) and workflow
//!   definitions (YAML)
//! - [`domain`] — Normalized asset/vulnerability model, scan lifecycle,
//!   target validation, and the adapter contract
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! neosec-core/
//! ├── domain/           # Pure values and contracts
//! │   ├── asset.rs      # Hosts, ports, web apps, subdomains
//! │   ├── vulnerability.rs
//! │   ├── scan.rs       # Task lifecycle + ScanResult
//! │   ├── target.rs     # Validated scan targets
//! │   └── adapter.rs    # ToolAdapter contract + option values
//! └── config/           # Global config + workflow specs
//! ```
//!
//! Everything here is a value or a contract: no I/O happens in `domain`,
//! and nothing in this crate spawns processes.

pub mod config;
pub mod domain;
pub mod logging;

pub use config::{ConfigError, GlobalConfig, ToolConfig};
pub use config::workflow::{TaskSpec, WorkflowError, WorkflowSpec};
pub use logging::init_tracing;
