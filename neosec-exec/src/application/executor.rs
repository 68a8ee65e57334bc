//! The subprocess executor
//!
//! One [`ProcessExecutor::run`] call owns one child process end to end:
//!
//! 1. Resolve the program (absolute path, or bare name via PATH).
//! 2. Spawn with piped stdio into a fresh process group.
//! 3. Drain stdout and stderr concurrently into capped buffers.
//! 4. Wait at a single selection point: child exit, timeout, or cancel.
//! 5. On timeout/cancel, SIGTERM the group, wait the grace period, SIGKILL.
//! 6. Reap the child, sweep the group, join the drainers.
//!
//! The group sweep in step 6 runs on every path, so a tool that forked
//! grandchildren cannot leave them behind even when it exited normally.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::command::CommandSpec;
use crate::domain::outcome::{ExecutionOutcome, TerminalStatus};

/// Stateless executor primitive. The pool wraps it with admission control.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

/// Shared capture buffer written by a drainer task.
#[derive(Default)]
struct CaptureBuf {
    data: Vec<u8>,
    truncated: bool,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run a command to completion under the spec's policy.
    ///
    /// This never returns early with the child still alive: whatever the
    /// outcome, the child has been reaped and its process group swept
    /// before the outcome is handed back.
    pub async fn run(&self, spec: &CommandSpec, cancel: CancellationToken) -> ExecutionOutcome {
        let started = Instant::now();

        let program = match spec.resolve_program() {
            Ok(program) => program,
            Err(err) => {
                warn!(program = spec.program(), error = %err, "binary resolution failed");
                return ExecutionOutcome::spawn_failed(err.to_string(), started.elapsed());
            }
        };

        let mut command = Command::new(&program);
        command
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        // New session-equivalent: the child leads its own process group so a
        // single signal reaches every descendant.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %program.display(), error = %err, "spawn failed");
                return ExecutionOutcome::spawn_failed(err.to_string(), started.elapsed());
            }
        };

        let pid = child.id();
        debug!(program = %program.display(), pid, "child spawned");

        let cap = spec.limits.max_bytes;
        let stdout_buf = Arc::new(Mutex::new(CaptureBuf::default()));
        let stderr_buf = Arc::new(Mutex::new(CaptureBuf::default()));

        let stdout_task = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(drain(stream, Arc::clone(&stdout_buf), cap)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stream| tokio::spawn(drain(stream, Arc::clone(&stderr_buf), cap)));

        // Single selection point: exit, timeout, or cancellation.
        let deadline = tokio::time::sleep(spec.timeout);
        tokio::pin!(deadline);

        let (status, exit_code) = tokio::select! {
            result = child.wait() => {
                let code = result.ok().and_then(|s| s.code());
                (TerminalStatus::Completed, code)
            }
            _ = &mut deadline => {
                debug!(pid, timeout_secs = spec.timeout.as_secs(), "timeout expired, killing process group");
                terminate_group(&mut child, pid, spec.grace_period).await;
                (TerminalStatus::TimedOut, None)
            }
            _ = cancel.cancelled() => {
                debug!(pid, "cancellation requested, killing process group");
                terminate_group(&mut child, pid, spec.grace_period).await;
                (TerminalStatus::Cancelled, None)
            }
        };

        // Sweep stragglers on every path. For a normally-exited child this
        // also closes any pipe ends grandchildren were holding, so the
        // drainers below are guaranteed to reach EOF.
        sweep_group(pid);

        join_drainer(stdout_task, spec.grace_period).await;
        join_drainer(stderr_task, spec.grace_period).await;

        let stdout = take_capture(stdout_buf);
        let stderr = take_capture(stderr_buf);

        ExecutionOutcome {
            status,
            pid,
            exit_code,
            stdout: stdout.data,
            stderr: stderr.data,
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
            duration: started.elapsed(),
        }
    }
}

/// Read a stream to EOF, keeping at most `cap` bytes.
///
/// Past the cap the stream keeps being consumed so the child never blocks
/// on a full pipe; the overflow is discarded and the buffer marked.
async fn drain(mut stream: impl AsyncRead + Unpin, buf: Arc<Mutex<CaptureBuf>>, cap: usize) {
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut guard = buf.lock().expect("capture buffer poisoned");
                let room = cap.saturating_sub(guard.data.len());
                let take = n.min(room);
                guard.data.extend_from_slice(&chunk[..take]);
                if take < n {
                    guard.truncated = true;
                }
            }
        }
    }
}

/// Graceful-then-forced termination of the child's process group, followed
/// by an unconditional reap.
async fn terminate_group(child: &mut Child, pid: Option<u32>, grace: Duration) {
    signal_group(pid, GroupSignal::Terminate, child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => {
            debug!(pid, "child exited within grace period");
        }
        Err(_) => {
            debug!(pid, "grace period expired, sending SIGKILL");
            signal_group(pid, GroupSignal::Kill, child);
            // SIGKILL cannot be ignored; this wait reaps the child.
            let _ = child.wait().await;
        }
    }
}

/// Kill any group members that outlived the child. Errors (group already
/// gone) are expected and ignored.
fn sweep_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = pid;
}

enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: GroupSignal, _child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    if let Err(err) = killpg(Pid::from_raw(pid as i32), signal) {
        debug!(pid, signal = %signal, error = %err, "process group signal not delivered");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _signal: GroupSignal, child: &mut Child) {
    let _ = child.start_kill();
}

/// Wait for a drainer to hit EOF, bounded so an unkillable pipe holder
/// cannot stall the outcome. The capture buffer is shared, so aborting a
/// straggler loses nothing already read.
async fn join_drainer(task: Option<tokio::task::JoinHandle<()>>, window: Duration) {
    if let Some(mut task) = task {
        if tokio::time::timeout(window, &mut task).await.is_err() {
            warn!("output drainer did not reach EOF within the grace window");
            task.abort();
        }
    }
}

fn take_capture(buf: Arc<Mutex<CaptureBuf>>) -> CaptureBuf {
    let mut guard = buf.lock().expect("capture buffer poisoned");
    CaptureBuf {
        data: std::mem::take(&mut guard.data),
        truncated: guard.truncated,
    }
}
