//! Tests for `src/dispatch.rs` — forking workers through the supervisor.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use coldboot::supervisor::{CompletionSupervisor, Phase, SystemReaper};
use serial_test::serial;

use crate::support::Journal;

#[test]
#[serial]
fn every_slot_runs_in_its_own_process() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let journal = Journal::new(tmp.path());
    let total = NonZeroUsize::new(4).expect("non-zero");

    let mut supervisor = CompletionSupervisor::new();
    supervisor
        .dispatch(total, |slot| {
            journal.record("slot", &format!("{}/{}", slot.index(), slot.total()));
        })
        .expect("fork should succeed");

    assert_eq!(supervisor.phase(), Phase::Waiting);
    assert_eq!(supervisor.pool().len(), 4);

    supervisor
        .supervise(&mut SystemReaper)
        .expect("all workers should succeed");
    assert_eq!(supervisor.phase(), Phase::Done);

    let entries = journal.of_kind("slot");
    let slots: BTreeSet<String> = entries.iter().map(|e| e.detail.clone()).collect();
    let expected: BTreeSet<String> = (0..4).map(|i| format!("{i}/4")).collect();
    assert_eq!(slots, expected);

    let pids: BTreeSet<u32> = entries.iter().map(|e| e.pid).collect();
    assert_eq!(pids.len(), 4);
    assert!(!pids.contains(&std::process::id()));
}

#[test]
#[serial]
fn workers_with_empty_share_still_succeed() {
    let total = NonZeroUsize::new(3).expect("non-zero");
    let mut supervisor = CompletionSupervisor::new();
    supervisor
        .dispatch(total, |_slot| {})
        .expect("fork should succeed");

    supervisor
        .supervise(&mut SystemReaper)
        .expect("idle workers exit successfully");
    assert!(supervisor.pool().is_empty());
}

/// Records a `dropped` entry when its destructor runs.
struct DropRecorder(Journal);

impl Drop for DropRecorder {
    fn drop(&mut self) {
        self.0.record("dropped", "");
    }
}

#[test]
#[serial]
fn workers_exit_without_running_parent_destructors() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let journal = Journal::new(tmp.path());
    let recorder = DropRecorder(journal.clone());
    let total = NonZeroUsize::new(2).expect("non-zero");

    let mut supervisor = CompletionSupervisor::new();
    supervisor
        .dispatch(total, |slot| {
            journal.record("slot", &slot.index().to_string());
        })
        .expect("fork should succeed");
    supervisor
        .supervise(&mut SystemReaper)
        .expect("all workers should succeed");

    assert_eq!(journal.of_kind("slot").len(), 2);
    assert!(
        journal.of_kind("dropped").is_empty(),
        "workers must not run destructors owned by the parent"
    );

    drop(recorder);
    let dropped = journal.of_kind("dropped");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].pid, std::process::id());
}
