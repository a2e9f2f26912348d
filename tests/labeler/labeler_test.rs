//! Tests for `src/selinux.rs` — `CommandLabeler` argument passing.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use coldboot::selinux::{CommandLabeler, DisabledLabeler, Labeler, RestoreconMode};
use serial_test::serial;

/// Shell script that appends its arguments to `log`, one invocation per line.
fn recording_tool(dir: &Path, log: &Path, exit_code: i32) -> PathBuf {
    let script = dir.join("fake-restorecon");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$*\" >> '{}'\nexit {exit_code}\n",
            log.display()
        ),
    )
    .expect("should write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
        .expect("should make script executable");
    script
}

fn invocations(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
#[serial]
fn recursive_mode_passes_dash_r() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let log = tmp.path().join("calls");
    let labeler = CommandLabeler::new(recording_tool(tmp.path(), &log, 0));

    labeler.restorecon(Path::new("/sys/devices"), RestoreconMode::Shallow);
    labeler.restorecon(Path::new("/sys/class"), RestoreconMode::Recursive);

    assert_eq!(
        invocations(&log),
        vec!["/sys/devices".to_owned(), "-R /sys/class".to_owned()]
    );
}

#[test]
#[serial]
fn failing_tool_is_tolerated() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let log = tmp.path().join("calls");
    let labeler = CommandLabeler::new(recording_tool(tmp.path(), &log, 3));

    labeler.restorecon(Path::new("/sys/block"), RestoreconMode::Recursive);

    assert_eq!(invocations(&log), vec!["-R /sys/block".to_owned()]);
}

#[test]
#[serial]
fn missing_tool_is_tolerated() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let labeler = CommandLabeler::new(tmp.path().join("no-such-restorecon"));

    labeler.restorecon(Path::new("/sys"), RestoreconMode::Recursive);
}

#[test]
fn disabled_labeler_does_nothing() {
    DisabledLabeler.restorecon(Path::new("/sys"), RestoreconMode::Recursive);
}
