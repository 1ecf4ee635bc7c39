//! Tagged outcome of a CRM notification attempt.
//!
//! The circuit breaker consumes the tag through [`NotifyError::trips_breaker`]
//! instead of inspecting messages.

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;
use std::time::Duration;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NotifyError {
    /// The CRM received the event and refused it.
    #[error("Rejected Error: HTTP {status_code} - {message} {location}")]
    Rejected {
        status_code: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: no answer within {timeout:?} {location}")]
    Timeout {
        timeout: Duration,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },
}

impl NotifyError {
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        NotifyError::Unavailable {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(timeout: Duration) -> Self {
        NotifyError::Timeout {
            timeout,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn transport(message: impl Into<String>) -> Self {
        NotifyError::Transport {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Categorize a non-success HTTP answer from the CRM.
    #[track_caller]
    pub fn from_status(status_code: HttpStatusCode, body: impl Into<String>) -> Self {
        if status_code.is_rejection() {
            NotifyError::Rejected {
                status_code,
                message: body.into(),
                location: ErrorLocation::from(Location::caller()),
            }
        } else if status_code.is_unavailable() {
            NotifyError::Unavailable {
                message: format!("HTTP {status_code} - {}", body.into()),
                location: ErrorLocation::from(Location::caller()),
            }
        } else {
            NotifyError::Transport {
                message: format!("Unexpected HTTP {status_code} - {}", body.into()),
                location: ErrorLocation::from(Location::caller()),
            }
        }
    }

    /// Create from reqwest error with proper categorization.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            return Self::timeout(timeout);
        }

        if error.is_connect() {
            return Self::unavailable(error.to_string());
        }

        if let Some(status) = error.status() {
            return Self::from_status(HttpStatusCode(status.as_u16()), error.to_string());
        }

        Self::transport(error.to_string())
    }

    /// Whether the breaker should count this as a channel failure.
    ///
    /// A rejection means the CRM is up and answering.
    pub fn trips_breaker(&self) -> bool {
        !matches!(self, NotifyError::Rejected { .. })
    }

    pub fn error_category(&self) -> &'static str {
        match self {
            NotifyError::Rejected { .. } => "rejected",
            NotifyError::Unavailable { .. } => "unavailable",
            NotifyError::Timeout { .. } => "timeout",
            NotifyError::Transport { .. } => "transport",
        }
    }
}

impl From<url::ParseError> for NotifyError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        NotifyError::Transport {
            message: format!("Invalid CRM URL: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
