//! Command specifications
//!
//! A [`CommandSpec`] is the only way to hand work to the executor. It is an
//! argv vector plus execution policy; there is deliberately no constructor
//! that takes a command *string*.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::outcome::CaptureLimits;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// An argv vector with execution policy attached.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    tokens: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Wall-clock limit from spawn to exit.
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL when the group must be killed.
    pub grace_period: Duration,
    pub limits: CaptureLimits,
}

impl CommandSpec {
    /// Build a spec from argv tokens. The vector must be non-empty and
    /// token 0 must not be blank; deeper validation (binary resolution)
    /// happens at spawn time so a missing binary surfaces as a
    /// `SpawnFailed` outcome rather than an error here.
    pub fn new(tokens: Vec<String>) -> Result<Self, CommandError> {
        if tokens.is_empty() {
            return Err(CommandError::Empty);
        }
        if tokens[0].trim().is_empty() {
            return Err(CommandError::BlankProgram);
        }

        Ok(Self {
            tokens,
            cwd: None,
            env: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            limits: CaptureLimits::default(),
        })
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_capture_limit(mut self, max_bytes: usize) -> Self {
        self.limits = CaptureLimits::new(max_bytes);
        self
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Resolve token 0 to a spawnable path.
    ///
    /// Absolute paths pass through untouched. Bare names are looked up on
    /// PATH. Relative paths with separators are rejected: they are neither
    /// absolute nor resolvable, and accepting them would make the command
    /// depend on the orchestrator's working directory.
    pub fn resolve_program(&self) -> Result<PathBuf, CommandError> {
        let program = self.program();
        let path = Path::new(program);

        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if program.contains(std::path::MAIN_SEPARATOR) {
            return Err(CommandError::RelativeProgram(program.to_string()));
        }

        which::which(program).map_err(|_| CommandError::NotFound(program.to_string()))
    }
}

/// Invalid command construction or resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command has no tokens")]
    Empty,

    #[error("command program token is blank")]
    BlankProgram,

    #[error("program '{0}' is a relative path; use an absolute path or a bare name")]
    RelativeProgram(String),

    #[error("program '{0}' was not found on PATH")]
    NotFound(String),
}
