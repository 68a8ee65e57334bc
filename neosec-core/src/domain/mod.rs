//! Core domain model
//!
//! Pure values and contracts shared across the workspace. Nothing in this
//! module performs I/O.

pub mod adapter;
pub mod asset;
pub mod scan;
pub mod target;
pub mod vulnerability;

pub use adapter::{
    AdapterError, BinaryProbe, CommandRequest, OptionMap, OptionValue, ParsedOutput, RawOutput,
    ScanObserver, ToolAdapter, ToolCategory, ToolDescriptor,
};
pub use asset::{Asset, Host, Port, PortState, Protocol, Subdomain, WebApp};
pub use scan::{RunStatus, ScanResult, TaskRecord, TaskState, TransitionError};
pub use target::{Target, TargetError, TargetKind};
pub use vulnerability::{Cvss, Severity, Vulnerability, VulnerabilityCategory};
