use call_core::error::config::ConfigError;
use call_core::error::{ContactSourceError, NotifyError};

use common::ErrorLocation;

use thiserror::Error;

/// Errors that stop the host from starting or running.
///
/// Core errors keep their own location; host errors capture where the host
/// gave up.
#[derive(Debug, Error)]
pub enum CallbridgeError {
    /// Error from this host
    #[error("Callbridge Error: {message} {location}")]
    Callbridge {
        message: String,
        location: ErrorLocation,
    },

    /// Reading the replay input failed
    #[error("Replay Error: {message} {location}")]
    Replay {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The CRM client could not be built
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The contact source could not be built
    #[error(transparent)]
    ContactSource(#[from] ContactSourceError),
}
