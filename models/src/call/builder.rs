use crate::error::model_error::ModelError;
use crate::{CallDirection, CallEvent, CallEventState, TransportKind};

use common::ErrorLocation;

use std::panic::Location;
use std::time::SystemTime;

/// Builder for validated [`CallEvent`]s.
///
/// Transport adapters use it so that a malformed event is rejected at the
/// edge instead of reaching the call tracker.
#[derive(Debug, Default)]
pub struct CallEventBuilder {
    call_id: Option<String>,
    direction: Option<CallDirection>,
    remote_number: Option<String>,
    state: Option<CallEventState>,
    timestamp: Option<SystemTime>,
    transport: Option<TransportKind>,
}

impl CallEventBuilder {
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_direction(mut self, direction: CallDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_remote_number(mut self, number: impl Into<String>) -> Self {
        self.remote_number = Some(number.into());
        self
    }

    pub fn with_state(mut self, state: CallEventState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the event with validation.
    ///
    /// Call id and state are required. Direction defaults to inbound, the
    /// timestamp to now and the transport to [`TransportKind::External`].
    #[track_caller]
    pub fn build(self) -> Result<CallEvent, ModelError> {
        let call_id = self.call_id.ok_or_else(|| ModelError::Validation {
            message: String::from("Call id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if call_id.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Call id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let state = self.state.ok_or_else(|| ModelError::Validation {
            message: format!("State is required for call {call_id}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(CallEvent {
            call_id,
            direction: self.direction.unwrap_or_default(),
            remote_number: self.remote_number.unwrap_or_default(),
            state,
            timestamp: self.timestamp.unwrap_or_else(SystemTime::now),
            transport: self.transport.unwrap_or_default(),
        })
    }
}
