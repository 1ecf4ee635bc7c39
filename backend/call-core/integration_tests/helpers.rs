//! Shared fixtures for the integration tests:
//! - a recording notification sink and one that stalls a single call
//! - contact and event builders
//! - an orchestrator wired around a given sink and contact list
//! - polling until an asynchronous effect shows up

use call_core::call_tracker::TrackerSettings;
use call_core::circuit_breaker::CircuitBreaker;
use call_core::contact_index::{ContactIndex, SharedContactIndex};
use call_core::error::NotifyError;
use call_core::normalizer::PhoneNormalizer;
use call_core::notifier::{NotificationSink, Notifier};
use call_core::orchestrator::CallOrchestrator;
use call_core::status::StatusBoard;

use models::{
    CallDirection, CallEvent, CallEventBuilder, CallEventState, Contact, ContactOrigin,
    Notification, NotificationKind,
};

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Semaphore;

/// Sink that keeps every notification it receives, optionally failing them.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingSink {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().expect("sink lock").clone()
    }

    pub fn kinds_for(&self, call_id: &str) -> Vec<NotificationKind> {
        self.received()
            .into_iter()
            .filter(|n| n.call_id == call_id)
            .map(|n| n.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.received
            .lock()
            .expect("sink lock")
            .push(notification.clone());

        if self.fail {
            return Err(NotifyError::unavailable("CRM down"));
        }
        Ok(())
    }
}

/// Sink whose sends for one call id block until [`StallingSink::release`].
pub struct StallingSink {
    stalled_call: String,
    gate: Semaphore,
}

impl StallingSink {
    pub fn stalling(call_id: &str) -> Arc<Self> {
        Arc::new(Self {
            stalled_call: call_id.to_string(),
            gate: Semaphore::new(0),
        })
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl NotificationSink for StallingSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.call_id == self.stalled_call {
            // The permit goes straight back, so once released nothing stalls again.
            let _permit = self.gate.acquire().await;
        }
        Ok(())
    }
}

pub fn contact(id: &str, name: &str, numbers: &[&str]) -> Contact {
    Contact::new(id, name, ContactOrigin::PrimaryDirectory, numbers.iter().copied())
}

pub fn inbound(call_id: &str, state: CallEventState, number: &str, at: SystemTime) -> CallEvent {
    CallEventBuilder::default()
        .with_call_id(call_id)
        .with_direction(CallDirection::Inbound)
        .with_state(state)
        .with_remote_number(number)
        .with_timestamp(at)
        .build()
        .expect("test event should be valid")
}

/// Orchestrator over `contacts`, notifying `sink`, comparing `compare_length` digits.
pub fn orchestrator(
    sink: Arc<RecordingSink>,
    contacts: Vec<Contact>,
    compare_length: usize,
) -> Arc<CallOrchestrator> {
    orchestrator_with_sink(sink, contacts, compare_length)
}

pub fn orchestrator_with_sink(
    sink: Arc<dyn NotificationSink>,
    contacts: Vec<Contact>,
    compare_length: usize,
) -> Arc<CallOrchestrator> {
    let normalizer = PhoneNormalizer::new(compare_length);
    let index = SharedContactIndex::new(ContactIndex::build(contacts, &normalizer));
    let breaker = Arc::new(CircuitBreaker::new("crm", 3, Duration::from_secs(30)));
    let status = Arc::new(StatusBoard::new());
    let notifier = Notifier::new(sink, breaker, 4, Duration::from_secs(2))
        .with_status(Arc::clone(&status));

    Arc::new(CallOrchestrator::new(
        normalizer,
        index,
        TrackerSettings::default(),
        notifier,
        status,
    ))
}

/// Poll `check` every 10ms until it holds. False if `within` runs out first.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(within, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
