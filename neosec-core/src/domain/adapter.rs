//! Adapter contract
//!
//! Every external tool is wrapped by exactly one [`ToolAdapter`]. The
//! adapter knows two things: how to turn a (target, options) pair into an
//! argv vector, and how to turn the tool's raw output back into the
//! normalized model. Both directions are pure; adapters never perform I/O,
//! never spawn processes, and hold no mutable state. Process execution
//! belongs to the executor crate, and routing belongs to the extension bus.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use super::scan::ScanResult;
use super::target::Target;
use super::vulnerability::Vulnerability;

/// Category tag every adapter declares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Recon,
    Scanner,
    Fuzzer,
    Exploit,
    Other,
}

/// Identity an adapter registers with the extension bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Canonical tool name: lowercase ASCII, unique across the registry.
    pub name: String,
    pub category: ToolCategory,
    pub description: String,
    /// Binary names the tool needs on the host.
    pub required_binaries: Vec<String>,
}

/// A single option value from the workflow file.
///
/// Workflow options arrive as arbitrary YAML scalars; this tagged variant
/// replaces the source format's runtime-typed map so adapters can validate
/// against concrete types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Options map as parsed from a task definition.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// Everything an adapter needs to build a command line.
#[derive(Debug, Clone)]
pub struct CommandRequest<'a> {
    pub target: &'a Target,
    pub options: &'a OptionMap,
    /// Resolved path of the tool's primary binary; goes in as token 0.
    pub binary: &'a Path,
}

/// Raw captured output handed to `parse_output`.
#[derive(Debug, Clone, Copy)]
pub struct RawOutput<'a> {
    pub stdout: &'a [u8],
    pub stderr: &'a [u8],
    /// The capture hit the configured cap and was cut; parsers should be
    /// prepared for a mid-record end of input.
    pub truncated: bool,
}

impl<'a> RawOutput<'a> {
    pub fn stdout_str(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.stdout)
    }

    pub fn stderr_str(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.stderr)
    }
}

/// Normalized result of parsing one task's output.
#[derive(Debug, Clone, Default)]
pub struct ParsedOutput {
    pub assets: Vec<Asset>,
    pub vulnerabilities: Vec<Vulnerability>,
}

/// The contract every tool adapter satisfies.
///
/// `build_command` must place the resolved binary path as token 0 and
/// validate every dynamic option against its own allowlist; anything not on
/// the allowlist is rejected, never passed through.
pub trait ToolAdapter: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Canonical lowercase name; must match `descriptor().name`.
    fn name(&self) -> &str;

    fn build_command(&self, request: &CommandRequest<'_>) -> Result<Vec<String>, AdapterError>;

    /// Pure and deterministic: the same raw output always parses to the same
    /// normalized result.
    fn parse_output(&self, output: &RawOutput<'_>) -> Result<ParsedOutput, AdapterError>;
}

/// Lifecycle listener for broadcast hooks.
///
/// All methods have empty default bodies so observers implement only what
/// they care about. A failing observer is logged and skipped by the bus; it
/// never aborts the broadcast.
#[async_trait]
pub trait ScanObserver: Send + Sync {
    /// Name used in log lines when the observer fails.
    fn observer_name(&self) -> &str;

    async fn on_scan_start(&self, _workflow: &str, _target: &Target) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn on_task_start(&self, _task_id: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn on_task_complete(
        &self,
        _task_id: &str,
        _state: super::scan::TaskState,
    ) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn on_scan_complete(&self, _result: &ScanResult) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Result of probing one required binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryProbe {
    pub binary: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<PathBuf>,
}

impl BinaryProbe {
    /// Probe for a binary. An explicit configured path wins over PATH
    /// lookup; PATH is consulted only when no override is given.
    pub fn resolve(binary: &str, explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            let available = path.is_file();
            return Self {
                binary: binary.to_string(),
                available,
                resolved_path: available.then(|| path.to_path_buf()),
            };
        }

        match which::which(binary) {
            Ok(path) => Self {
                binary: binary.to_string(),
                available: true,
                resolved_path: Some(path),
            },
            Err(_) => Self {
                binary: binary.to_string(),
                available: false,
                resolved_path: None,
            },
        }
    }
}

/// Errors raised at the adapter boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// An option key the adapter does not accept.
    #[error("tool '{tool}' does not accept option '{key}'")]
    UnsupportedOption { tool: String, key: String },

    /// An accepted key carrying a value that fails the allowlist pattern.
    #[error("invalid value for option '{key}' of tool '{tool}': {reason}")]
    InvalidOption {
        tool: String,
        key: String,
        reason: String,
    },

    /// The tool's output could not be parsed into the normalized model.
    #[error("failed to parse {format} output of tool '{tool}': {reason}")]
    Parse {
        tool: String,
        format: String,
        reason: String,
    },

    /// Observer-side failure during a broadcast hook.
    #[error("observer failure: {0}")]
    Observer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_value_deserializes_untagged() {
        let map: OptionMap = serde_yml::from_str(
            "ports: \"1-1024\"\ntiming: 4\nservice_detection: true\nscripts:\n  - default\n  - vuln\n",
        )
        .unwrap();

        assert_eq!(map["ports"].as_str(), Some("1-1024"));
        assert_eq!(map["timing"].as_int(), Some(4));
        assert_eq!(map["service_detection"].as_bool(), Some(true));
        assert!(matches!(&map["scripts"], OptionValue::List(v) if v.len() == 2));
    }

    #[test]
    fn option_value_accessors_reject_cross_type_reads() {
        let v = OptionValue::Int(7);
        assert_eq!(v.as_str(), None);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_int(), Some(7));
    }

    #[test]
    fn probe_missing_binary_reports_unavailable() {
        let probe = BinaryProbe::resolve("neosec-definitely-not-a-real-binary", None);
        assert!(!probe.available);
        assert!(probe.resolved_path.is_none());
    }

    #[test]
    fn explicit_path_wins_over_path_lookup() {
        // /bin/sh exists everywhere we test; an explicit bogus path must not
        // fall back to PATH.
        let probe = BinaryProbe::resolve("sh", Some(Path::new("/nonexistent/sh")));
        assert!(!probe.available);

        let probe = BinaryProbe::resolve("sh", Some(Path::new("/bin/sh")));
        assert!(probe.available);
        assert_eq!(probe.resolved_path.as_deref(), Some(Path::new("/bin/sh")));
    }
}
