//! Terminal failure conditions of a cold boot attempt.
//!
//! A [`Fatal`] is never recovered from. The orchestrator returns it up to the
//! binary, which turns it into process termination through
//! [`Fatal::terminate`]. The service supervisor restarting the daemon is the
//! recovery path.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tracing::error;

/// Exit status used when a [`Fatal`] terminates the orchestrator.
pub const FATAL_EXIT_STATUS: i32 = 1;

/// A condition that aborts the whole cold boot attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[must_use = "a Fatal must terminate the process"]
pub enum Fatal {
    /// Creating a worker process failed.
    #[error("fork() failed for worker {worker}: {source}")]
    Fork {
        /// Index of the worker that could not be created.
        worker: usize,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },

    /// A worker exited normally with a non-zero status.
    #[error("subprocess {pid} exited with status {status}")]
    WorkerExited {
        /// Process id of the worker.
        pid: Pid,
        /// Exit status reported by the kernel.
        status: i32,
    },

    /// A worker was terminated by a signal.
    #[error("subprocess {pid} killed by signal {signal}")]
    WorkerSignaled {
        /// Process id of the worker.
        pid: Pid,
        /// Terminating signal.
        signal: Signal,
    },
}

impl Fatal {
    /// Log the cause and terminate the current process with a non-zero status.
    ///
    /// Remaining workers are not cleaned up.
    pub fn terminate(self) -> ! {
        error!(cause = %self, "cold boot aborted");
        std::process::exit(FATAL_EXIT_STATUS)
    }
}
