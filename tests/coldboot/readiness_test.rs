//! Tests for `src/readiness.rs` — property file publication.

use coldboot::readiness::{PropertyFile, ReadinessSignal, COLD_BOOT_DONE_PROP};

#[test]
fn set_ready_writes_true() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let property = PropertyFile::new(&tmp.path().join("props"));

    property.set_ready().expect("should publish");

    assert_eq!(property.path(), tmp.path().join("props").join(COLD_BOOT_DONE_PROP));
    let contents = std::fs::read_to_string(property.path()).expect("should read property");
    assert_eq!(contents, "true\n");

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("props"))
        .expect("should list props")
        .filter_map(Result::ok)
        .map(|e| e.file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temp file must be renamed away");
}

#[test]
fn set_ready_is_idempotent() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let property = PropertyFile::new(tmp.path());

    property.set_ready().expect("first publish");
    property.set_ready().expect("second publish");

    let contents = std::fs::read_to_string(property.path()).expect("should read property");
    assert_eq!(contents, "true\n");
}

#[test]
fn set_ready_fails_when_dir_is_a_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "").expect("should write blocker");

    let property = PropertyFile::new(&blocker);
    assert!(property.set_ready().is_err());
}
