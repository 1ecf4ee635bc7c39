use crate::error::call::CallError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum OrchestratorError {
    #[error("Channel Closed Error: {message} {location}")]
    ChannelClosed {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Call(#[from] CallError),
}
