//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use packet_session::config::{
    LoggingConfig, NetworkConfig, SessionConfig, TransportConfig, DEFAULT_MAX_FRAME_SIZE,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_transport_address() {
    let mut config = NetworkConfig::default();
    config.transport.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Invalid transport address")));
}

#[test]
fn test_empty_transport_address() {
    let mut config = NetworkConfig::default();
    config.transport.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_max_frame_size() {
    let mut config = NetworkConfig::default();
    config.session.max_frame_size = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max frame size cannot be 0")));
}

#[test]
fn test_excessive_max_frame_size() {
    let mut config = NetworkConfig::default();
    config.session.max_frame_size = 64 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max frame size too large")));
}

#[test]
fn test_short_read_timeout() {
    let mut config = NetworkConfig::default();
    config.session.read_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Read timeout too short")));
}

#[test]
fn test_zero_timeouts_disable_deadlines() {
    let mut config = NetworkConfig::default();
    config.session.read_timeout = Duration::ZERO;
    config.session.write_timeout = Duration::ZERO;

    assert!(config.validate().is_empty());
    assert_eq!(config.session.read_timeout(), None);
    assert_eq!(config.session.write_timeout(), None);
}

#[test]
fn test_connect_timeout_bounds() {
    let mut config = NetworkConfig::default();
    config.transport.connect_timeout = Duration::from_millis(10);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Connect timeout too short")));

    config.transport.connect_timeout = Duration::from_secs(600);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Connect timeout too long")));
}

#[test]
fn test_long_shutdown_timeout() {
    let mut config = NetworkConfig::default();
    config.transport.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_empty_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_log_to_file_without_path() {
    let mut config = NetworkConfig::default();
    config.logging.log_to_file = true;
    config.logging.log_file_path = None;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_no_logging_outputs() {
    let mut config = NetworkConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = NetworkConfig::default();
    config.transport.address = String::new();

    let error = config.validate_strict().unwrap_err();
    assert!(error
        .to_string()
        .contains("Configuration validation failed"));
}

#[test]
fn test_multiple_validation_errors() {
    let config = NetworkConfig::default_with_overrides(|config| {
        config.transport.address = String::new();
        config.session.max_frame_size = 0;
        config.logging.app_name = String::new();
    });

    let errors = config.validate();
    assert!(
        errors.len() >= 3,
        "Expected at least 3 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = NetworkConfig::from_toml(
        r#"
        [session]
        max_frame_size = 4096
        read_timeout = 0
        write_timeout = 500
        "#,
    )
    .unwrap();

    assert_eq!(config.session.max_frame_size, 4096);
    assert_eq!(config.session.read_timeout(), None);
    assert_eq!(config.transport.address, "127.0.0.1:25565");
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = NetworkConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        log_to_console = true
        log_to_file = false
        json_format = false
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.toml");

    let config = NetworkConfig {
        session: SessionConfig {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(2),
        },
        transport: TransportConfig {
            address: "0.0.0.0:25566".to_string(),
            connect_timeout: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            tcp_nodelay: false,
        },
        logging: LoggingConfig {
            log_level: Level::DEBUG,
            json_format: true,
            ..LoggingConfig::default()
        },
    };
    config.save_to_file(&path).unwrap();

    let loaded = NetworkConfig::from_file(&path).unwrap();
    assert!(loaded.validate().is_empty());
    assert_eq!(loaded.session.read_timeout, Duration::from_secs(15));
    assert_eq!(loaded.transport.address, "0.0.0.0:25566");
    assert!(!loaded.transport.tcp_nodelay);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_example_config_parses() {
    let example = NetworkConfig::example_config();
    let parsed = NetworkConfig::from_toml(&example).unwrap();
    assert_eq!(parsed.session.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
}
