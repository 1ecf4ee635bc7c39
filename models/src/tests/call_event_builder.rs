use crate::{CallDirection, CallEventBuilder, CallEventState, ModelError, TransportKind};

use std::time::{Duration, SystemTime};

/// **VALUE**: Verifies that the builder rejects events without a call id.
///
/// **WHY THIS MATTERS**: The call id is the only key the tracker has. An event
/// without one cannot be attributed to any call and would corrupt ordering.
///
/// **BUG THIS CATCHES**: Would catch the required-field check being removed or
/// whitespace ids slipping through.
#[test]
fn given_blank_call_id_when_building_then_returns_validation_error() {
    // GIVEN: Builder with a whitespace call id
    let builder = CallEventBuilder::default()
        .with_call_id("   ")
        .with_state(CallEventState::Offered);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Call id cannot be empty");
        }
        Ok(event) => panic!("Expected validation error, got {event:?}"),
    }
}

#[test]
fn given_missing_state_when_building_then_returns_validation_error() {
    // GIVEN: Builder without a state
    let builder = CallEventBuilder::default().with_call_id("c1");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Error names the call
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert!(message.contains("State is required"));
            assert!(message.contains("c1"));
        }
        Ok(event) => panic!("Expected validation error, got {event:?}"),
    }
}

#[test]
fn given_only_required_fields_when_building_then_defaults_apply() {
    // GIVEN: Minimal builder
    let before = SystemTime::now();
    let event = CallEventBuilder::default()
        .with_call_id("c1")
        .with_state(CallEventState::Connected)
        .build()
        .expect("minimal event should build");

    // THEN: Defaults fill the rest
    assert_eq!(event.direction, CallDirection::Inbound);
    assert_eq!(event.transport, TransportKind::External);
    assert!(event.remote_number.is_empty());
    assert!(event.timestamp >= before);
}

#[test]
fn given_all_fields_when_building_then_values_are_kept() {
    let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let event = CallEventBuilder::default()
        .with_call_id("c7")
        .with_direction(CallDirection::Outbound)
        .with_remote_number("+49 89 1234")
        .with_state(CallEventState::Dialing)
        .with_timestamp(at)
        .with_transport(TransportKind::Pipe)
        .build()
        .expect("complete event should build");

    assert_eq!(event.call_id, "c7");
    assert_eq!(event.direction, CallDirection::Outbound);
    assert_eq!(event.remote_number, "+49 89 1234");
    assert_eq!(event.timestamp, at);
    assert_eq!(event.transport, TransportKind::Pipe);
}
