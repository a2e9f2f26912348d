//! Striped work partitioning.
//!
//! Queue index `i` belongs to worker `i mod N`. Every worker derives its own
//! share from its index, the worker count and the frozen queue length, so no
//! coordination is needed. Striping rather than chunking spreads expensive
//! neighbours (large directory trees) across workers.

use std::num::NonZeroUsize;

/// Owner of queue index `index` among `total` workers.
pub fn owner(index: usize, total: NonZeroUsize) -> usize {
    index % total
}

/// Identity of one worker inside a pool of `total` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerSlot {
    index: usize,
    total: NonZeroUsize,
}

impl WorkerSlot {
    /// Slot `index` of `total`, or `None` if `index >= total`.
    pub fn new(index: usize, total: NonZeroUsize) -> Option<Self> {
        (index < total.get()).then_some(Self { index, total })
    }

    /// Worker index in `[0, total)`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Total worker count.
    pub fn total(&self) -> NonZeroUsize {
        self.total
    }

    /// Indices in `[0, len)` owned by this worker, ascending.
    pub fn indices(&self, len: usize) -> impl Iterator<Item = usize> {
        (self.index..len).step_by(self.total.get())
    }

    /// Returns `true` when this worker owns `index`.
    pub fn owns(&self, index: usize) -> bool {
        owner(index, self.total) == self.index
    }
}

/// All slots of a pool of `total` workers, in index order.
pub fn slots(total: NonZeroUsize) -> impl Iterator<Item = WorkerSlot> {
    (0..total.get()).map(move |index| WorkerSlot { index, total })
}
