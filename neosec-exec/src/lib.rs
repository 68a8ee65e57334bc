//! NeoSec Exec - Safe execution of external tool binaries
//!
//! External security tools are untrusted in one specific way: they may hang,
//! flood their pipes, or leave grandchildren behind. This crate owns every
//! process NeoSec spawns and guarantees:
//!
//! - **No shell.** Commands are argv vectors handed to the OS directly;
//!   there is no string that a shell ever interprets.
//! - **Deadlock-free capture.** stdout and stderr are drained concurrently
//!   while the child runs, with a per-stream size cap. A child emitting more
//!   than the OS pipe buffer never wedges the run.
//! - **No survivors.** Children run in their own process group; on timeout
//!   or cancellation the whole group gets SIGTERM, a grace period, then
//!   SIGKILL. Every child is reaped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use neosec_exec::{CommandSpec, ExecutorPool};
//! use tokio_util::sync::CancellationToken;
//!
//! let pool = ExecutorPool::new(5);
//! let spec = CommandSpec::new(vec!["nmap".into(), "-sV".into(), "192.0.2.1".into()])?
//!     .with_timeout(std::time::Duration::from_secs(600));
//! let outcome = pool.run(spec, CancellationToken::new()).await;
//! ```

pub mod application;
pub mod domain;

pub use application::executor::ProcessExecutor;
pub use application::pool::ExecutorPool;
pub use domain::command::{CommandError, CommandSpec};
pub use domain::outcome::{CaptureLimits, ExecutionOutcome, TerminalStatus};
