use call_core::config::BridgeConfig;
use call_core::error::config::ConfigError;

use std::time::Duration;

#[test]
fn given_missing_file_when_loaded_then_defaults() {
    // GIVEN: A directory without a config file
    let dir = tempfile::tempdir().expect("temp dir");

    // WHEN: Loading
    let config = BridgeConfig::load(&dir.path().join("callbridge.toml")).expect("defaults");

    // THEN: Defaults
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn given_config_file_when_loaded_then_values_applied() {
    // GIVEN: A config file on disk
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("callbridge.toml");
    std::fs::write(
        &path,
        r#"
[matching]
last_contact_window_minutes = 0

[calls]
sweep_interval_seconds = 5

[crm]
base_url = "https://crm.example.org"
max_concurrent_notifications = 8

[contacts]
file = "/var/lib/callbridge/contacts.json"
refresh_interval_minutes = 15
"#,
    )
    .expect("write config");

    // WHEN: Loading
    let config = BridgeConfig::load(&path).expect("valid config");

    // THEN: Overrides visible through the accessors
    assert_eq!(config.routing_window(), Duration::ZERO);
    assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    assert_eq!(config.crm.max_concurrent_notifications, 8);
    assert_eq!(config.refresh_interval(), Some(Duration::from_secs(15 * 60)));
    assert!(config.contacts.file.is_some());
}

/// **VALUE**: A broken config file is an error, not silently replaced by defaults.
///
/// **WHY THIS MATTERS**: Falling back to defaults would drop the CRM URL and
/// quietly stop all notifications.
///
/// **BUG THIS CATCHES**: Would catch `load` swallowing parse errors.
#[test]
fn given_corrupt_file_when_loaded_then_parse_error_names_path() {
    // GIVEN: A file with broken TOML
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("callbridge.toml");
    std::fs::write(&path, "[crm\nbase_url = ").expect("write config");

    // WHEN: Loading
    let error = BridgeConfig::load(&path).expect_err("corrupt file");

    // THEN: Parse error carrying the path
    match error {
        ConfigError::ParseError { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn given_invalid_values_in_file_when_loaded_then_validation_error() {
    // GIVEN: A well-formed file with an unusable value
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("callbridge.toml");
    std::fs::write(&path, "[contacts.retry]\nmax_attempts = 0\n").expect("write config");

    // WHEN: Loading
    let result = BridgeConfig::load(&path);

    // THEN: Validation error
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}
