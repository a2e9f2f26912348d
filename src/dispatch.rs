//! Worker process creation.
//!
//! Each worker is a forked copy of the orchestrator. It inherits the frozen
//! queues through the copy-on-write snapshot, processes its own striped
//! share and leaves through `_exit`, never returning into the caller's
//! control flow.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};

use nix::unistd::{fork, ForkResult};
use tracing::debug;

use crate::error::Fatal;
use crate::partition::{self, WorkerSlot};
use crate::supervisor::WorkerPool;

/// Exit status of a worker whose work function panicked.
pub const WORKER_PANIC_STATUS: i32 = 101;

/// Exit status of a worker that finished its share.
pub const WORKER_SUCCESS_STATUS: i32 = 0;

/// Fork `total` workers, each running `work` for its own slot.
///
/// Returns the pool of spawned process ids. The first fork failure is
/// returned as [`Fatal::Fork`]; workers already running are left alone.
pub fn spawn_workers<F>(total: NonZeroUsize, work: F) -> Result<WorkerPool, Fatal>
where
    F: Fn(WorkerSlot),
{
    let mut pool = WorkerPool::new();

    for slot in partition::slots(total) {
        // SAFETY: the child only reads state frozen before this point, runs
        // `work`, and leaves through `_exit` without returning to the caller.
        #[allow(unsafe_code)]
        let forked = unsafe { fork() };

        match forked {
            Ok(ForkResult::Parent { child }) => {
                debug!(worker = slot.index(), pid = %child, "worker forked");
                pool.track(child);
            }
            Ok(ForkResult::Child) => run_worker(slot, &work),
            Err(source) => {
                return Err(Fatal::Fork {
                    worker: slot.index(),
                    source,
                });
            }
        }
    }

    Ok(pool)
}

/// Child side: run the share, then exit immediately, skipping destructors
/// and atexit handlers inherited from the parent.
fn run_worker<F>(slot: WorkerSlot, work: &F) -> !
where
    F: Fn(WorkerSlot),
{
    let status = match panic::catch_unwind(AssertUnwindSafe(|| work(slot))) {
        Ok(()) => WORKER_SUCCESS_STATUS,
        Err(_) => WORKER_PANIC_STATUS,
    };

    // SAFETY: `_exit` takes no pointers and never returns. Skipping stdio
    // flushing and atexit handlers is intended: they belong to the parent.
    #[allow(unsafe_code)]
    unsafe {
        nix::libc::_exit(status)
    }
}
