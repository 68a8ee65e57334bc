//! Bounded-concurrency execution pool
//!
//! A thin admission gate in front of [`ProcessExecutor`]: at most
//! `max_concurrent` children run at once, submissions past the cap wait on
//! the semaphore. The pool imposes no ordering between submissions; that is
//! the scheduler's concern.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::ProcessExecutor;
use crate::domain::command::CommandSpec;
use crate::domain::outcome::{ExecutionOutcome, TerminalStatus};

/// Runs commands with bounded parallelism. Cheap to clone.
#[derive(Clone)]
pub struct ExecutorPool {
    executor: ProcessExecutor,
    semaphore: Arc<Semaphore>,
}

impl ExecutorPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            executor: ProcessExecutor::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Submit a command. Waits for a slot if the pool is saturated; a
    /// cancellation that fires while waiting returns a `Cancelled` outcome
    /// without ever spawning.
    pub async fn run(&self, spec: CommandSpec, cancel: CancellationToken) -> ExecutionOutcome {
        let permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                permit.expect("executor pool semaphore closed")
            }
            _ = cancel.cancelled() => {
                debug!(program = spec.program(), "cancelled while waiting for a pool slot");
                return ExecutionOutcome {
                    status: TerminalStatus::Cancelled,
                    pid: None,
                    exit_code: None,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    stdout_truncated: false,
                    stderr_truncated: false,
                    duration: std::time::Duration::ZERO,
                };
            }
        };

        let outcome = self.executor.run(&spec, cancel).await;
        drop(permit);
        outcome
    }

    /// Slots currently free; used by status displays and tests.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cap_is_raised_to_one() {
        let pool = ExecutorPool::new(0);
        assert_eq!(pool.available_slots(), 1);
    }
}
