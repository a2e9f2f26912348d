//! Tests for `src/logging.rs`.

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs").join("coldboot");
    assert!(!logs_dir.exists());

    // Only one global subscriber can be installed per process, so only the
    // directory side effect is asserted.
    let _result = coldboot::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_production_fails_when_dir_is_a_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let blocker = tmp.path().join("logs");
    std::fs::write(&blocker, "").expect("should create file");

    assert!(coldboot::logging::init_production(&blocker).is_err());
}

#[test]
fn init_cli_is_idempotent() {
    coldboot::logging::init_cli();
    coldboot::logging::init_cli();
}
