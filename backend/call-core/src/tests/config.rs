use crate::config::BridgeConfig;
use crate::error::config::ConfigError;

use std::time::Duration;

#[test]
fn given_empty_document_when_parsed_then_every_default_applies() {
    // GIVEN / WHEN: An empty TOML document
    let config = BridgeConfig::parse("").expect("empty config is valid");

    // THEN: Documented defaults
    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.matching.max_compare_length, 10);
    assert_eq!(config.routing_window(), Duration::from_secs(3600));
    assert_eq!(config.calls.stale_pending_timeout_seconds, 300);
    assert_eq!(config.stale_call_timeout(), Duration::from_secs(240 * 60));
    assert_eq!(config.crm.failure_threshold, 3);
    assert_eq!(config.open_timeout(), Duration::from_secs(30));
    assert!(config.crm.base_url.is_none());
    assert_eq!(config.refresh_interval(), Some(Duration::from_secs(3600)));
}

#[test]
fn given_partial_sections_when_parsed_then_missing_fields_keep_defaults() {
    // GIVEN: A document overriding a few fields
    let toml = r#"
        [matching]
        max_compare_length = 8

        [crm]
        base_url = "http://crm.local:8080/api"

        [contacts.retry]
        max_attempts = 5
    "#;

    // WHEN: Parsing
    let config = BridgeConfig::parse(toml).expect("valid config");

    // THEN: Overrides applied, the rest defaulted
    assert_eq!(config.matching.max_compare_length, 8);
    assert_eq!(config.matching.last_contact_window_minutes, 60);
    assert_eq!(config.crm.base_url.as_deref(), Some("http://crm.local:8080/api"));
    assert_eq!(config.crm.open_timeout_seconds, 30);
    assert_eq!(config.contacts.retry.max_attempts, 5);
    assert_eq!(config.contacts.retry.initial_delay_ms, 1000);
}

/// **VALUE**: Out-of-range timeouts are clamped, not rejected.
///
/// **WHY THIS MATTERS**: An operator typo in a timeout should not stop the
/// bridge from starting, but it must not disable the safety nets either.
///
/// **BUG THIS CATCHES**: Would catch the clamp bounds drifting from 10–300s and
/// 30–1440min, or raw values being passed to the breaker and tracker.
#[test]
fn given_out_of_range_timeouts_when_converted_then_clamped() {
    // GIVEN: Timeouts below and above the allowed ranges
    let low = BridgeConfig::parse(
        "[crm]\nopen_timeout_seconds = 1\n[calls]\nstale_call_timeout_minutes = 5\n",
    )
    .expect("clamped values are accepted");
    let high = BridgeConfig::parse(
        "[crm]\nopen_timeout_seconds = 9999\n[calls]\nstale_call_timeout_minutes = 99999\n",
    )
    .expect("clamped values are accepted");

    // WHEN / THEN: Converted values are inside the ranges
    assert_eq!(low.open_timeout(), Duration::from_secs(10));
    assert_eq!(low.tracker_settings().stale_call_timeout, Duration::from_secs(30 * 60));
    assert_eq!(high.open_timeout(), Duration::from_secs(300));
    assert_eq!(high.tracker_settings().stale_call_timeout, Duration::from_secs(1440 * 60));
}

#[test]
fn given_unusable_values_when_validated_then_rejected() {
    // GIVEN: Documents with values that cannot work
    let documents = [
        "[matching]\nmax_compare_length = 2\n",
        "[matching]\nmax_compare_length = 21\n",
        "[crm]\nfailure_threshold = 0\n",
        "[crm]\nbase_url = \"ftp://crm.local\"\n",
        "[contacts]\nsource_url = \"\"\n",
        "[contacts.retry]\nmax_attempts = 0\n",
        "[contacts.retry]\nbackoff_factor = 0.5\n",
        "[calls]\nsweep_interval_seconds = 0\n",
        "[calls]\nsweep_interval_seconds = 86401\n",
        "[matching]\nlast_contact_window_minutes = 9223372036854775807\n",
        "[contacts]\nrefresh_interval_minutes = 9223372036854775807\n",
    ];

    for document in documents {
        // WHEN: Parsing
        let result = BridgeConfig::parse(document);

        // THEN: Validation error
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "expected validation error for {document:?}, got {result:?}"
        );
    }
}

#[test]
fn given_malformed_toml_when_parsed_then_parse_error() {
    // GIVEN / WHEN: Broken TOML
    let result = BridgeConfig::parse("[matching\nmax_compare_length = ");

    // THEN: Parse error
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_retry_section_when_converted_then_policy_matches() {
    // GIVEN: A custom retry section
    let config = BridgeConfig::parse(
        "[contacts.retry]\nmax_attempts = 4\ninitial_delay_ms = 250\nbackoff_factor = 3.0\nmax_delay_seconds = 2\n",
    )
    .expect("valid config");

    // WHEN: Converting to a policy
    let policy = config.retry_policy();

    // THEN: Every field carried over
    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.initial_delay, Duration::from_millis(250));
    assert_eq!(policy.backoff_factor, 3.0);
    assert_eq!(policy.max_delay, Duration::from_secs(2));
}

#[test]
fn given_zero_refresh_interval_when_read_then_load_once() {
    // GIVEN / WHEN: Refresh disabled
    let config = BridgeConfig::parse("[contacts]\nrefresh_interval_minutes = 0\n").expect("valid");

    // THEN: No interval
    assert_eq!(config.refresh_interval(), None);
}

/// **VALUE**: Huge minute values never overflow when turned into durations.
///
/// **BUG THIS CATCHES**: Would catch `minutes * 60` panicking in debug builds
/// or wrapping to a tiny window in release when a struct skips `validate`.
#[test]
fn given_unvalidated_huge_minutes_when_converted_then_saturate() {
    // GIVEN: A config built in code with values `validate` would reject
    let mut config = BridgeConfig::default();
    config.matching.last_contact_window_minutes = u64::MAX;
    config.contacts.refresh_interval_minutes = u64::MAX;

    // WHEN: Converting to durations
    let window = config.routing_window();
    let refresh = config.refresh_interval();

    // THEN: Both saturate at the largest whole-second duration
    assert_eq!(window, Duration::from_secs(u64::MAX));
    assert_eq!(refresh, Some(Duration::from_secs(u64::MAX)));
    assert!(config.validate().is_err());
}
