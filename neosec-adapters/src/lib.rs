//! NeoSec Adapters - concrete tool integrations
//!
//! Each adapter implements [`ToolAdapter`] for one external binary:
//! building its argv from an allowlisted option schema and parsing its raw
//! output into the normalized asset/vulnerability model. Adapters are pure
//! translation layers; the orchestrator owns registration and the executor
//! owns the process.
//!
//! [`ToolAdapter`]: neosec_core::domain::adapter::ToolAdapter

pub mod nmap;

pub use nmap::NmapAdapter;
