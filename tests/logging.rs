//! Subscriber installation. Lives in its own test binary because the global
//! subscriber can only be set once per process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fast_rpc::config::LoggingConfig;
use fast_rpc::utils::logging::init_logging;
use tracing::Level;

#[test]
fn test_init_logging_to_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rpc.log");
    let config = LoggingConfig {
        log_level: Level::DEBUG,
        log_to_console: false,
        log_to_file: true,
        log_file_path: Some(path.display().to_string()),
        json_format: true,
        ..LoggingConfig::default()
    };
    assert!(config.validate().is_empty());

    init_logging(&config).expect("first install succeeds");
    tracing::info!(answer = 42, "after init");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("Logging initialized"));
    assert!(contents.contains("\"answer\":42"));

    // A second global subscriber is refused
    assert!(init_logging(&config).is_err());
}
