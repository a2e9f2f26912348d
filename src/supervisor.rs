//! Completion supervision of forked workers.
//!
//! A crashed or stuck worker is treated like a crash or hang of the daemon
//! itself. Any worker exiting non-zero or dying from a signal yields a
//! [`Fatal`]; the daemon then terminates, its service supervisor restarts it
//! and cold boot starts over. A hung worker keeps [`CompletionSupervisor::supervise`]
//! blocked; the boot timeout of the service supervisor bounds that wait.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use nix::errno::Errno;
use nix::sys::wait::{wait, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, error};

use crate::dispatch;
use crate::error::Fatal;
use crate::partition::WorkerSlot;

/// Process ids of workers that have not yet exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerPool {
    pids: HashSet<Pid>,
}

impl WorkerPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `pid`.
    pub fn track(&mut self, pid: Pid) {
        self.pids.insert(pid);
    }

    /// Returns `true` if `pid` is tracked.
    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    /// Number of outstanding workers.
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    /// Returns `true` when every worker is done.
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    fn complete(&mut self, pid: Pid) {
        self.pids.remove(&pid);
    }
}

impl FromIterator<Pid> for WorkerPool {
    fn from_iter<I: IntoIterator<Item = Pid>>(iter: I) -> Self {
        Self {
            pids: iter.into_iter().collect(),
        }
    }
}

/// Wait-for-any-child primitive.
pub trait Reaper {
    /// Block until some child changes state.
    ///
    /// # Errors
    ///
    /// Returns the OS error of the wait call, `EINTR` included.
    fn wait_any(&mut self) -> nix::Result<WaitStatus>;
}

/// [`Reaper`] backed by `wait(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemReaper;

impl Reaper for SystemReaper {
    fn wait_any(&mut self) -> nix::Result<WaitStatus> {
        wait()
    }
}

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing dispatched yet.
    Idle,
    /// Workers are being forked.
    Dispatching,
    /// Waiting for workers to exit.
    Waiting,
    /// Every worker exited successfully.
    Done,
    /// A worker failed or could not be created.
    Fatal,
}

/// Owns the [`WorkerPool`] and enforces the all-or-nothing completion policy.
#[derive(Debug)]
pub struct CompletionSupervisor {
    phase: Phase,
    pool: WorkerPool,
}

impl Default for CompletionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSupervisor {
    /// Idle supervisor with an empty pool.
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            pool: WorkerPool::new(),
        }
    }

    /// Supervisor already waiting on `pool`.
    pub fn watching(pool: WorkerPool) -> Self {
        Self {
            phase: Phase::Waiting,
            pool,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Workers still outstanding.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Fork `total` workers running `work` and start tracking them.
    ///
    /// # Errors
    ///
    /// Returns [`Fatal::Fork`] on the first failed fork.
    pub fn dispatch<F>(&mut self, total: NonZeroUsize, work: F) -> Result<(), Fatal>
    where
        F: Fn(WorkerSlot),
    {
        self.phase = Phase::Dispatching;
        match dispatch::spawn_workers(total, work) {
            Ok(pool) => {
                self.pool = pool;
                self.phase = Phase::Waiting;
                Ok(())
            }
            Err(fatal) => {
                self.phase = Phase::Fatal;
                Err(fatal)
            }
        }
    }

    /// Reap workers until all exited successfully or one failed.
    ///
    /// Interrupted waits are retried silently; other wait errors are logged
    /// and retried. Reaped processes that are not tracked are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Fatal::WorkerExited`] or [`Fatal::WorkerSignaled`] for the
    /// first tracked worker that did not exit with status 0. The remaining
    /// workers stay tracked and are not reaped.
    pub fn supervise<R>(&mut self, reaper: &mut R) -> Result<(), Fatal>
    where
        R: Reaper + ?Sized,
    {
        self.phase = Phase::Waiting;

        while !self.pool.is_empty() {
            let status = match reaper.wait_any() {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!(error = %e, "waitpid() failed");
                    continue;
                }
            };

            let fatal = match status {
                WaitStatus::Exited(pid, code) if self.pool.contains(pid) => {
                    if code == 0 {
                        self.pool.complete(pid);
                        debug!(pid = %pid, outstanding = self.pool.len(), "worker done");
                        continue;
                    }
                    Fatal::WorkerExited { pid, status: code }
                }
                WaitStatus::Signaled(pid, signal, _) if self.pool.contains(pid) => {
                    Fatal::WorkerSignaled { pid, signal }
                }
                other => {
                    debug!(status = ?other, "ignoring untracked or non-terminal wait status");
                    continue;
                }
            };

            error!(cause = %fatal, "worker failed");
            self.phase = Phase::Fatal;
            return Err(fatal);
        }

        self.phase = Phase::Done;
        Ok(())
    }
}
