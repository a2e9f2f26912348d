//! Cold boot orchestration.
//!
//! Sequence:
//! 1. Drain the uevent backlog into a frozen [`UeventQueue`].
//! 2. With parallel restorecon, label every preclaimed directory shallowly
//!    and expand it one level into the [`RestoreconQueue`].
//! 3. Fork the workers. Each handles its striped share of events and, with
//!    parallel restorecon, recursively relabels its share of directories.
//! 4. Without parallel restorecon, relabel the sysfs root recursively here
//!    while the workers run.
//! 5. Wait for every worker; any failure is [`Fatal`].
//! 6. Publish readiness.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::Fatal;
use crate::handler::UeventHandler;
use crate::partition::{self, WorkerSlot};
use crate::queue::{PreclaimedSet, RestoreconQueue};
use crate::readiness::ReadinessSignal;
use crate::selinux::{Labeler, RestoreconMode};
use crate::supervisor::{CompletionSupervisor, SystemReaper};
use crate::uevent::{UeventQueue, UeventSource};

/// Relabels slower than this are logged as candidates for preclaiming.
pub const SLOW_RESTORECON_THRESHOLD: Duration = Duration::from_millis(50);

/// Returns `true` when a single relabel took longer than
/// [`SLOW_RESTORECON_THRESHOLD`].
pub fn is_slow_restorecon(took: Duration) -> bool {
    took > SLOW_RESTORECON_THRESHOLD
}

/// Value-only orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdbootOptions {
    /// Relabel inside the workers instead of the orchestrator.
    pub parallel_restorecon: bool,
    /// Number of worker processes.
    pub workers: NonZeroUsize,
    /// Preclaimed directories; empty selects [`PreclaimedSet::sysfs_default`].
    pub parallel_restorecon_dirs: PreclaimedSet,
    /// Sysfs mount point.
    pub sysfs_root: PathBuf,
}

/// Outcome of a successful cold boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdbootReport {
    /// Wall-clock time from backlog drain to readiness.
    pub elapsed: Duration,
    /// Events replayed.
    pub uevents: usize,
    /// Directories relabeled by workers.
    pub restorecon_dirs: usize,
    /// Worker processes used.
    pub workers: usize,
}

/// Dry-run view of how work would be split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColdbootPlan {
    /// Events in the backlog.
    pub uevents: usize,
    /// Directories labeled by the orchestrator itself.
    pub preclaimed: Vec<PathBuf>,
    /// Directories handed to workers.
    pub restorecon_queue: Vec<PathBuf>,
    /// Per-worker shares.
    pub workers: Vec<WorkerPlan>,
}

/// One worker's share in a [`ColdbootPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerPlan {
    /// Worker index.
    pub index: usize,
    /// Backlog indices handled by this worker.
    pub uevents: Vec<usize>,
    /// Directories relabeled by this worker.
    pub restorecon: Vec<PathBuf>,
}

/// The cold boot engine.
pub struct ColdBoot {
    options: ColdbootOptions,
    source: Box<dyn UeventSource>,
    labeler: Box<dyn Labeler>,
    handlers: Vec<Box<dyn UeventHandler>>,
    readiness: Box<dyn ReadinessSignal>,
    uevent_queue: UeventQueue,
    restorecon_queue: RestoreconQueue,
}

impl std::fmt::Debug for ColdBoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColdBoot")
            .field("options", &self.options)
            .field("handlers", &self.handlers.len())
            .field("uevent_queue", &self.uevent_queue.len())
            .field("restorecon_queue", &self.restorecon_queue.len())
            .finish_non_exhaustive()
    }
}

impl ColdBoot {
    /// Create an engine over the given collaborators, with no handlers.
    pub fn new(
        options: ColdbootOptions,
        source: Box<dyn UeventSource>,
        labeler: Box<dyn Labeler>,
        readiness: Box<dyn ReadinessSignal>,
    ) -> Self {
        Self {
            options,
            source,
            labeler,
            handlers: Vec::new(),
            readiness,
            uevent_queue: UeventQueue::default(),
            restorecon_queue: RestoreconQueue::new(),
        }
    }

    /// Register a handler. Handlers run in registration order.
    pub fn register_handler(&mut self, handler: Box<dyn UeventHandler>) {
        self.handlers.push(handler);
    }

    /// Engine settings.
    pub fn options(&self) -> &ColdbootOptions {
        &self.options
    }

    /// The drained backlog.
    pub fn uevent_queue(&self) -> &UeventQueue {
        &self.uevent_queue
    }

    /// Directories queued for worker relabeling.
    pub fn restorecon_queue(&self) -> &RestoreconQueue {
        &self.restorecon_queue
    }

    /// Preclaimed directories, after defaulting.
    pub fn preclaimed(&self) -> &PreclaimedSet {
        &self.options.parallel_restorecon_dirs
    }

    /// Run the whole cold boot.
    ///
    /// # Errors
    ///
    /// Returns a [`Fatal`] if a worker could not be forked or did not exit
    /// successfully. The caller must terminate the process on it.
    pub fn run(&mut self) -> Result<ColdbootReport, Fatal> {
        let started = Instant::now();

        self.regenerate_uevents();
        self.restorecon_queue = RestoreconQueue::new();

        if self.options.parallel_restorecon {
            self.claim_default_dirs();
            let preclaimed = self.options.parallel_restorecon_dirs.clone();
            for dir in preclaimed.iter() {
                self.labeler.restorecon(dir, RestoreconMode::Shallow);
                self.restorecon_queue.expand(dir, &preclaimed);
            }
        }

        let mut supervisor = CompletionSupervisor::new();
        supervisor.dispatch(self.options.workers, |slot| self.worker_main(slot))?;

        if !self.options.parallel_restorecon {
            self.labeler
                .restorecon(&self.options.sysfs_root, RestoreconMode::Recursive);
        }

        supervisor.supervise(&mut SystemReaper)?;

        if let Err(e) = self.readiness.set_ready() {
            error!(error = %e, "failed to publish cold boot readiness");
        }

        let elapsed = started.elapsed();
        info!(
            uevents = self.uevent_queue.len(),
            restorecon_dirs = self.restorecon_queue.len(),
            workers = self.options.workers.get(),
            "Coldboot took {:.3} seconds",
            elapsed.as_secs_f64()
        );

        Ok(ColdbootReport {
            elapsed,
            uevents: self.uevent_queue.len(),
            restorecon_dirs: self.restorecon_queue.len(),
            workers: self.options.workers.get(),
        })
    }

    /// Build the queues as [`ColdBoot::run`] would, without labeling,
    /// forking or signalling readiness.
    ///
    /// Both queues are rebuilt from scratch on every call.
    pub fn plan(&mut self) -> ColdbootPlan {
        self.regenerate_uevents();
        self.restorecon_queue = RestoreconQueue::new();

        if self.options.parallel_restorecon {
            self.claim_default_dirs();
            let preclaimed = self.options.parallel_restorecon_dirs.clone();
            for dir in preclaimed.iter() {
                self.restorecon_queue.expand(dir, &preclaimed);
            }
        }

        let uevents = self.uevent_queue.len();
        let dirs = self.restorecon_queue.as_slice();
        let workers = partition::slots(self.options.workers)
            .map(|slot| WorkerPlan {
                index: slot.index(),
                uevents: slot.indices(uevents).collect(),
                restorecon: slot.indices(dirs.len()).map(|i| dirs[i].clone()).collect(),
            })
            .collect();

        ColdbootPlan {
            uevents,
            preclaimed: self
                .options
                .parallel_restorecon_dirs
                .iter()
                .map(Path::to_path_buf)
                .collect(),
            restorecon_queue: dirs.to_vec(),
            workers,
        }
    }

    /// Drain the backlog into the uevent queue, replacing any previous drain.
    pub fn regenerate_uevents(&mut self) {
        self.uevent_queue = UeventQueue::drain(self.source.as_mut());
        debug!(uevents = self.uevent_queue.len(), "uevent backlog drained");
    }

    /// Expand `directory` one level into the restorecon queue.
    pub fn generate_restorecon(&mut self, directory: &Path) {
        self.restorecon_queue
            .expand(directory, &self.options.parallel_restorecon_dirs);
    }

    fn claim_default_dirs(&mut self) {
        if self.options.parallel_restorecon_dirs.is_empty() {
            self.options.parallel_restorecon_dirs =
                PreclaimedSet::sysfs_default(&self.options.sysfs_root);
            info!("Parallel processing directory is not set, set the default");
        }
    }

    /// Body of a forked worker.
    fn worker_main(&self, slot: WorkerSlot) {
        self.handle_uevents(slot);
        if self.options.parallel_restorecon {
            self.restorecon_share(slot);
        }
    }

    fn handle_uevents(&self, slot: WorkerSlot) {
        for uevent in slot
            .indices(self.uevent_queue.len())
            .filter_map(|i| self.uevent_queue.get(i))
        {
            for handler in &self.handlers {
                handler.handle_uevent(uevent);
            }
        }
    }

    fn restorecon_share(&self, slot: WorkerSlot) {
        let process_started = Instant::now();

        for dir in slot
            .indices(self.restorecon_queue.len())
            .filter_map(|i| self.restorecon_queue.get(i))
        {
            let started = Instant::now();
            self.labeler.restorecon(dir, RestoreconMode::Recursive);

            // Slow directories are worth adding to the preclaimed list.
            let took = started.elapsed();
            if is_slow_restorecon(took) {
                info!(
                    duration_ms = took.as_millis(),
                    dir = %dir.display(),
                    worker = slot.index(),
                    "slow restorecon"
                );
            }
        }

        debug!(
            duration_ms = process_started.elapsed().as_millis(),
            worker = slot.index(),
            "worker restorecon share done"
        );
    }
}
