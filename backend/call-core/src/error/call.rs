use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CallError {
    /// An event or request referenced a call in a way its current state does not allow.
    #[error("Protocol Violation Error: call {call_id}: {message} {location}")]
    ProtocolViolation {
        call_id: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Contact Error: {contact_id} {location}")]
    UnknownContact {
        contact_id: String,
        location: ErrorLocation,
    },
}

impl CallError {
    #[track_caller]
    pub fn protocol_violation(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        CallError::ProtocolViolation {
            call_id: call_id.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_contact(contact_id: impl Into<String>) -> Self {
        CallError::UnknownContact {
            contact_id: contact_id.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
