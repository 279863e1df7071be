//! Subscriber setup.

use kindred::logging::{init_cli, init_production, LoggingGuard};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn production_logging_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process; the directory is created
    // before installation is attempted.
    let _guard = init_production(&logs_dir);
    assert!(logs_dir.exists());
}

#[test]
fn cli_logging_twice_is_harmless() {
    init_cli();
    init_cli();
}
