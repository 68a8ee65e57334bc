//! Execution outcomes and capture limits

use std::time::Duration;

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The child exited on its own (any exit code).
    Completed,
    /// The wall-clock timeout expired and the process group was killed.
    TimedOut,
    /// The caller's cancel signal fired and the process group was killed.
    Cancelled,
    /// The child never started (binary missing, permission denied).
    SpawnFailed,
}

/// Per-stream capture policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Maximum bytes kept per stream. Past this the stream keeps being
    /// drained (so the child cannot block on a full pipe) but data is
    /// discarded and the outcome records truncation.
    pub max_bytes: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl CaptureLimits {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

/// Everything known about one finished execution.
///
/// Partial captures are always preserved: a timed-out or cancelled child
/// still returns whatever it wrote before it was killed.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub status: TerminalStatus,
    /// OS pid the child ran as; `None` when the spawn failed. The pid also
    /// names the child's process group.
    pub pid: Option<u32>,
    /// Exit code when the child exited normally; `None` when it was killed
    /// by a signal or never spawned.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// Completed with exit code zero.
    pub fn success(&self) -> bool {
        self.status == TerminalStatus::Completed && self.exit_code == Some(0)
    }

    /// Either stream hit the capture cap.
    pub fn truncated(&self) -> bool {
        self.stdout_truncated || self.stderr_truncated
    }

    pub(crate) fn spawn_failed(message: String, duration: Duration) -> Self {
        Self {
            status: TerminalStatus::SpawnFailed,
            pid: None,
            exit_code: None,
            stdout: Vec::new(),
            stderr: message.into_bytes(),
            stdout_truncated: false,
            stderr_truncated: false,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_completed_and_zero_exit() {
        let mut outcome = ExecutionOutcome {
            status: TerminalStatus::Completed,
            pid: Some(1234),
            exit_code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            duration: Duration::from_millis(1),
        };
        assert!(outcome.success());

        outcome.exit_code = Some(2);
        assert!(!outcome.success());

        outcome.exit_code = Some(0);
        outcome.status = TerminalStatus::TimedOut;
        assert!(!outcome.success());
    }

    #[test]
    fn spawn_failed_carries_error_in_stderr() {
        let outcome =
            ExecutionOutcome::spawn_failed("No such file or directory".into(), Duration::ZERO);
        assert_eq!(outcome.status, TerminalStatus::SpawnFailed);
        assert!(String::from_utf8_lossy(&outcome.stderr).contains("No such file"));
    }
}
