mod circuit_breaker;
mod config;
mod contact_index;
mod notifier;
mod retry;
mod status;

use models::{CallDirection, CallEvent, CallEventBuilder, CallEventState, Contact, ContactOrigin};

use std::sync::Arc;
use std::time::SystemTime;

pub(crate) fn contact(id: &str, numbers: &[&str]) -> Contact {
    Contact::new(id, format!("Contact {id}"), ContactOrigin::PrimaryDirectory, numbers.iter().copied())
}

pub(crate) fn shared_contact(id: &str, numbers: &[&str]) -> Arc<Contact> {
    Arc::new(contact(id, numbers))
}

pub(crate) fn inbound(call_id: &str, state: CallEventState, number: &str, at: SystemTime) -> CallEvent {
    event(call_id, CallDirection::Inbound, state, number, at)
}

pub(crate) fn outbound(call_id: &str, state: CallEventState, number: &str, at: SystemTime) -> CallEvent {
    event(call_id, CallDirection::Outbound, state, number, at)
}

fn event(
    call_id: &str,
    direction: CallDirection,
    state: CallEventState,
    number: &str,
    at: SystemTime,
) -> CallEvent {
    CallEventBuilder::default()
        .with_call_id(call_id)
        .with_direction(direction)
        .with_state(state)
        .with_remote_number(number)
        .with_timestamp(at)
        .build()
        .expect("test event should be valid")
}
