//! Errors from fetching the contact directory.
//!
//! The category decides what the retry policy does with a failure:
//! - `Transient`: the source answered but has no data yet, or was slow. Retry.
//! - `Permanent`: the data came back in a shape we cannot use. Stop.
//! - `Unavailable`: the source could not be reached at all. Stop and keep the old index.

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ContactSourceError {
    #[error("Transient Error: {message} {location}")]
    Transient {
        message: String,
        location: ErrorLocation,
    },

    #[error("Permanent Error: {message} {location}")]
    Permanent {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },
}

impl ContactSourceError {
    #[track_caller]
    pub fn transient(message: impl Into<String>) -> Self {
        ContactSourceError::Transient {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn permanent(message: impl Into<String>) -> Self {
        ContactSourceError::Permanent {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        ContactSourceError::Unavailable {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Categorize a reqwest failure before it is flattened into a string.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::transient(format!("Contact fetch timed out: {error}"));
        }

        if error.is_connect() {
            return Self::unavailable(format!("Contact source unreachable: {error}"));
        }

        if let Some(status) = error.status() {
            return Self::from_status(HttpStatusCode(status.as_u16()), error.to_string());
        }

        if error.is_decode() {
            return Self::permanent(format!("Contact payload could not be decoded: {error}"));
        }

        Self::unavailable(format!("Contact fetch failed: {error}"))
    }

    /// Categorize a non-success HTTP answer.
    #[track_caller]
    pub fn from_status(status_code: HttpStatusCode, body: impl Into<String>) -> Self {
        let body = body.into();

        if status_code.is_not_ready() {
            Self::transient(format!("Contact source not ready (HTTP {status_code}): {body}"))
        } else if status_code.is_server_error() {
            Self::unavailable(format!("Contact source failing (HTTP {status_code}): {body}"))
        } else {
            Self::permanent(format!("Contact source refused (HTTP {status_code}): {body}"))
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContactSourceError::Transient { .. })
    }

    pub fn error_category(&self) -> &'static str {
        match self {
            ContactSourceError::Transient { .. } => "transient",
            ContactSourceError::Permanent { .. } => "permanent",
            ContactSourceError::Unavailable { .. } => "unavailable",
        }
    }
}

impl From<serde_json::Error> for ContactSourceError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ContactSourceError::Permanent {
            message: format!("Incompatible contact data: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<url::ParseError> for ContactSourceError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        ContactSourceError::Permanent {
            message: format!("Invalid contact source URL: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
