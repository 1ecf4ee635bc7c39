//! Bridge configuration, read from `callbridge.toml`.
//!
//! Every field has a default, so a missing file or a missing section is
//! fine. Values that cannot work are rejected by [`BridgeConfig::validate`];
//! values that are merely out of the sensible range are clamped with a warning
//! by the accessors that hand them to the core.

use crate::call_tracker::TrackerSettings;
use crate::error::config::ConfigError;
use crate::retry::RetryPolicy;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_DIR_NAME: &str = "callbridge";
pub const CONFIG_FILE_NAME: &str = "callbridge.toml";

const MIN_COMPARE_LENGTH: usize = 4;
const MAX_COMPARE_LENGTH: usize = 20;
const MIN_STALE_CALL_MINUTES: u64 = 30;
const MAX_STALE_CALL_MINUTES: u64 = 1440;
const MIN_OPEN_TIMEOUT_SECONDS: u64 = 10;
const MAX_OPEN_TIMEOUT_SECONDS: u64 = 300;
/// Upper bound for minute-based windows and intervals: one week.
const MAX_WINDOW_MINUTES: u64 = 7 * 24 * 60;
/// Upper bound for the sweep interval: one day.
const MAX_SWEEP_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_max_compare_length")]
    pub max_compare_length: usize,
    /// Zero disables last-contact routing.
    #[serde(default = "default_last_contact_window_minutes")]
    pub last_contact_window_minutes: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_compare_length: default_max_compare_length(),
            last_contact_window_minutes: default_last_contact_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallsConfig {
    #[serde(default = "default_stale_pending_timeout_seconds")]
    pub stale_pending_timeout_seconds: u64,
    #[serde(default = "default_stale_call_timeout_minutes")]
    pub stale_call_timeout_minutes: u64,
    #[serde(default = "default_finished_retention_seconds")]
    pub finished_retention_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            stale_pending_timeout_seconds: default_stale_pending_timeout_seconds(),
            stale_call_timeout_minutes: default_stale_call_timeout_minutes(),
            finished_retention_seconds: default_finished_retention_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Without a URL notifications are only written to the log.
    pub base_url: Option<String>,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_open_timeout_seconds")]
    pub open_timeout_seconds: u64,
    #[serde(default = "default_notify_timeout_seconds")]
    pub notify_timeout_seconds: u64,
    #[serde(default = "default_max_concurrent_notifications")]
    pub max_concurrent_notifications: usize,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            failure_threshold: default_failure_threshold(),
            open_timeout_seconds: default_open_timeout_seconds(),
            notify_timeout_seconds: default_notify_timeout_seconds(),
            max_concurrent_notifications: default_max_concurrent_notifications(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_seconds")]
    pub max_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_seconds: default_max_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactsConfig {
    pub source_url: Option<String>,
    pub file: Option<PathBuf>,
    /// Zero loads once at startup.
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            file: None,
            refresh_interval_minutes: default_refresh_interval_minutes(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub calls: CallsConfig,

    #[serde(default)]
    pub crm: CrmConfig,

    #[serde(default)]
    pub contacts: ContactsConfig,
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_max_compare_length() -> usize {
    crate::normalizer::DEFAULT_MAX_COMPARE_LENGTH
}
fn default_last_contact_window_minutes() -> u64 {
    60
}
fn default_stale_pending_timeout_seconds() -> u64 {
    300
}
fn default_stale_call_timeout_minutes() -> u64 {
    240
}
fn default_finished_retention_seconds() -> u64 {
    300
}
fn default_sweep_interval_seconds() -> u64 {
    30
}
fn default_event_queue_capacity() -> usize {
    256
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_open_timeout_seconds() -> u64 {
    30
}
fn default_notify_timeout_seconds() -> u64 {
    10
}
fn default_max_concurrent_notifications() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_max_delay_seconds() -> u64 {
    30
}
fn default_refresh_interval_minutes() -> u64 {
    60
}
fn default_fetch_timeout_seconds() -> u64 {
    60
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// `{config_dir}/callbridge/callbridge.toml` for the current user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectoryNotFound`] if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Load config from `path`.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&contents).map_err(|e| match e {
            ConfigError::ParseError {
                location, reason, ..
            } => ConfigError::ParseError {
                location,
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: PathBuf::new(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let length = self.matching.max_compare_length;
        if !(MIN_COMPARE_LENGTH..=MAX_COMPARE_LENGTH).contains(&length) {
            return Err(validation_error(format!(
                "matching.max_compare_length: {length} (must be {MIN_COMPARE_LENGTH}-{MAX_COMPARE_LENGTH})"
            )));
        }

        let window = self.matching.last_contact_window_minutes;
        if window > MAX_WINDOW_MINUTES {
            return Err(validation_error(format!(
                "matching.last_contact_window_minutes: {window} (must be at most {MAX_WINDOW_MINUTES})"
            )));
        }

        let sweep = self.calls.sweep_interval_seconds;
        if sweep == 0 || sweep > MAX_SWEEP_INTERVAL_SECONDS {
            return Err(validation_error(format!(
                "calls.sweep_interval_seconds: {sweep} (must be 1-{MAX_SWEEP_INTERVAL_SECONDS})"
            )));
        }

        if self.calls.event_queue_capacity == 0 {
            return Err(validation_error("calls.event_queue_capacity cannot be 0"));
        }

        if self.crm.failure_threshold == 0 {
            return Err(validation_error("crm.failure_threshold cannot be 0"));
        }

        if self.crm.notify_timeout_seconds == 0 {
            return Err(validation_error("crm.notify_timeout_seconds cannot be 0"));
        }

        if self.crm.max_concurrent_notifications == 0 {
            return Err(validation_error("crm.max_concurrent_notifications cannot be 0"));
        }

        if let Some(ref url) = self.crm.base_url {
            validate_url("crm.base_url", url)?;
        }

        if let Some(ref url) = self.contacts.source_url {
            validate_url("contacts.source_url", url)?;
        }

        let refresh = self.contacts.refresh_interval_minutes;
        if refresh > MAX_WINDOW_MINUTES {
            return Err(validation_error(format!(
                "contacts.refresh_interval_minutes: {refresh} (must be at most {MAX_WINDOW_MINUTES})"
            )));
        }

        if self.contacts.fetch_timeout_seconds == 0 {
            return Err(validation_error("contacts.fetch_timeout_seconds cannot be 0"));
        }

        let retry = &self.contacts.retry;
        if retry.max_attempts == 0 {
            return Err(validation_error("contacts.retry.max_attempts cannot be 0"));
        }

        if retry.backoff_factor.is_nan() || retry.backoff_factor < 1.0 {
            return Err(validation_error(format!(
                "contacts.retry.backoff_factor: {} (must be at least 1.0)",
                retry.backoff_factor
            )));
        }

        Ok(())
    }

    pub fn routing_window(&self) -> Duration {
        from_minutes(self.matching.last_contact_window_minutes)
    }

    pub fn stale_call_timeout(&self) -> Duration {
        let minutes = clamp_with_warning(
            "calls.stale_call_timeout_minutes",
            self.calls.stale_call_timeout_minutes,
            MIN_STALE_CALL_MINUTES,
            MAX_STALE_CALL_MINUTES,
        );
        from_minutes(minutes)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(clamp_with_warning(
            "crm.open_timeout_seconds",
            self.crm.open_timeout_seconds,
            MIN_OPEN_TIMEOUT_SECONDS,
            MAX_OPEN_TIMEOUT_SECONDS,
        ))
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.crm.notify_timeout_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.calls.sweep_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.contacts.fetch_timeout_seconds)
    }

    /// `None` when contacts are loaded once.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.contacts.refresh_interval_minutes {
            0 => None,
            minutes => Some(from_minutes(minutes)),
        }
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            stale_pending_timeout: Duration::from_secs(self.calls.stale_pending_timeout_seconds),
            stale_call_timeout: self.stale_call_timeout(),
            finished_retention: Duration::from_secs(self.calls.finished_retention_seconds),
            routing_window: self.routing_window(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.contacts.retry;
        RetryPolicy {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            backoff_factor: retry.backoff_factor,
            max_delay: Duration::from_secs(retry.max_delay_seconds),
        }
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}

#[track_caller]
fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(validation_error(format!("{field} cannot be empty string")));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(validation_error(format!("{field}: invalid URL format: {url}")));
    }

    Ok(())
}

/// Saturates instead of overflowing for fields `validate` has not seen.
fn from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

fn clamp_with_warning(field: &str, value: u64, min: u64, max: u64) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{field} = {value} is outside {min}-{max}, using {clamped}");
    }
    clamped
}
