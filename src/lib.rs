//! Coldboot — the cold boot engine of a device manager.
//!
//! At startup the whole backlog of kernel device events is replayed and the
//! sysfs tree is relabeled before the rest of boot may proceed. Both jobs are
//! split across forked worker processes by striping the frozen work queues;
//! a worker that crashes or exits non-zero aborts the whole attempt.
//!
//! See `DESIGN.md` for the architecture notes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub mod handler;
pub mod readiness;
pub mod selinux;
pub mod sysfs;
pub mod uevent;

pub mod coldboot;
pub mod dispatch;
pub mod partition;
pub mod queue;
pub mod supervisor;
