//! The canonical call registry.
//!
//! Every transport's events land here, keyed by call id, and are mapped onto
//! one lifecycle:
//!
//! ```text
//! Pending ──► Offered ──► Connected ──► Finished
//!    │           │
//!    └───────────┴──────► Abandoned
//! ```
//!
//! The tracker is a plain owned struct with `&mut self` mutators. The
//! orchestrator keeps the single instance behind a lock, which serializes
//! mutation while letting readers query concurrently.
//!
//! Nothing here survives a restart.

use crate::error::call::CallError;
use crate::normalizer::NormalizedNumber;
use crate::routing::{LastContactRouting, resolve_contact};

use common::MaskedNumber;
use models::{
    CallDirection, CallEvent, CallEventState, CallState, Contact, Notification, NotificationKind,
    TransportKind,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_STALE_PENDING_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_STALE_CALL_TIMEOUT: Duration = Duration::from_secs(240 * 60);
pub const DEFAULT_FINISHED_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// How long a dial request waits for the transport to confirm it.
    pub stale_pending_timeout: Duration,
    /// Live calls without any event for this long are force-evicted.
    pub stale_call_timeout: Duration,
    /// Terminal calls stay queryable this long unless acknowledged first.
    pub finished_retention: Duration,
    /// Last-contact routing window; zero disables routing.
    pub routing_window: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            stale_pending_timeout: DEFAULT_STALE_PENDING_TIMEOUT,
            stale_call_timeout: DEFAULT_STALE_CALL_TIMEOUT,
            finished_retention: DEFAULT_FINISHED_RETENTION,
            routing_window: crate::routing::DEFAULT_ROUTING_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call_id: String,
    pub direction: CallDirection,
    pub transport: TransportKind,
    pub remote_number: String,
    pub normalized_number: NormalizedNumber,
    /// Everything the index returned for the number, in index order.
    pub candidates: Vec<Arc<Contact>>,
    pub contact: Option<Arc<Contact>>,
    /// Set when the contact was chosen explicitly; routing no longer overrides it.
    pub contact_locked: bool,
    pub state: CallState,
    pub started_at: SystemTime,
    pub connected_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub last_activity: Instant,
    /// The dial request this call confirmed, if any.
    pub pending_id: Option<String>,
}

impl CallRecord {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// Talk time for finished calls, ring time for abandoned ones.
    pub fn duration(&self) -> Option<Duration> {
        let ended = self.ended_at?;
        let began = self.connected_at.unwrap_or(self.started_at);
        Some(ended.duration_since(began).unwrap_or_default())
    }

    pub fn to_notification(&self, kind: NotificationKind) -> Notification {
        let (contact_id, contact_name) = self
            .contact
            .as_ref()
            .map(|c| (c.id.clone(), c.name.clone()))
            .unwrap_or_default();

        Notification {
            kind,
            call_id: self.call_id.clone(),
            direction: self.direction,
            state: self.state,
            remote_number: self.remote_number.clone(),
            contact_id,
            contact_name,
            began_at: Some(self.started_at),
            ended_at: self.ended_at,
            duration_seconds: self.duration().map(|d| d.as_secs()),
        }
    }
}

/// An outbound dial that was requested but not yet seen on any transport.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub pending_id: String,
    pub requested_number: String,
    pub normalized_number: NormalizedNumber,
    pub contact: Option<Arc<Contact>>,
    pub requested_at: SystemTime,
    pub created_at: Instant,
}

impl PendingCall {
    /// The pending dial seen as a call in state `Pending`.
    pub fn as_record(&self) -> CallRecord {
        CallRecord {
            call_id: self.pending_id.clone(),
            direction: CallDirection::Outbound,
            transport: TransportKind::External,
            remote_number: self.requested_number.clone(),
            normalized_number: self.normalized_number.clone(),
            candidates: self.contact.iter().cloned().collect(),
            contact: self.contact.clone(),
            contact_locked: self.contact.is_some(),
            state: CallState::Pending,
            started_at: self.requested_at,
            connected_at: None,
            ended_at: None,
            last_activity: self.created_at,
            pending_id: Some(self.pending_id.clone()),
        }
    }
}

/// What applying one event or request changed.
#[derive(Debug, Clone)]
pub enum CallChange {
    Started { reconciled_from: Option<String> },
    Connected,
    ContactChanged { previous: Option<Arc<Contact>> },
    Finished,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct CallUpdate {
    /// The record after the change.
    pub record: CallRecord,
    /// Empty for duplicates and other no-ops.
    pub changes: Vec<CallChange>,
}

impl CallUpdate {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Everything one sweep removed.
#[derive(Debug, Default)]
pub struct Eviction {
    pub pending: Vec<PendingCall>,
    pub stale_calls: Vec<CallRecord>,
    pub expired_terminal: Vec<CallRecord>,
    pub routing_purged: usize,
}

impl Eviction {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
            && self.stale_calls.is_empty()
            && self.expired_terminal.is_empty()
            && self.routing_purged == 0
    }
}

#[derive(Debug)]
pub struct CallTracker {
    settings: TrackerSettings,
    calls: HashMap<String, CallRecord>,
    pending: HashMap<String, PendingCall>,
    routing: LastContactRouting,
}

impl CallTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            calls: HashMap::new(),
            pending: HashMap::new(),
            routing: LastContactRouting::new(settings.routing_window),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Apply one transport event.
    ///
    /// `number` and `candidates` are the normalized remote number and its
    /// index lookup; they are only consulted when the event starts a call or
    /// brings the first usable number for one.
    pub fn apply(
        &mut self,
        event: &CallEvent,
        number: NormalizedNumber,
        candidates: Vec<Arc<Contact>>,
        now: Instant,
    ) -> Result<CallUpdate, CallError> {
        if !self.calls.contains_key(&event.call_id) {
            return match event.state {
                CallEventState::Disconnected => Err(CallError::protocol_violation(
                    &event.call_id,
                    "disconnect for a call that was never announced",
                )),
                _ => Ok(self.start_call(event, number, candidates, now)),
            };
        }

        let routed = self.routing.lookup(&number, now).map(str::to_string);
        let routing = &self.routing;
        let Some(record) = self.calls.get_mut(&event.call_id) else {
            return Err(CallError::protocol_violation(&event.call_id, "call vanished"));
        };

        if record.state.is_terminal() {
            debug!(
                "Ignoring {:?} for call {} already {}",
                event.state, record.call_id, record.state
            );
            return Ok(CallUpdate {
                record: record.clone(),
                changes: Vec::new(),
            });
        }

        record.last_activity = now;
        let mut changes = Vec::new();

        if record.normalized_number.is_empty() && !number.is_empty() {
            let previous = record.contact.clone();
            record.remote_number = event.remote_number.clone();
            record.normalized_number = number;
            record.candidates = candidates;
            record.contact = resolve_contact(&record.candidates, routed.as_deref()).cloned();
            if !same_contact(&previous, &record.contact) {
                changes.push(CallChange::ContactChanged { previous });
            }
        }

        match event.state {
            state if state.is_announcement() => {
                debug!("Duplicate {state:?} for call {}", record.call_id);
            }
            CallEventState::Connected => {
                if record.state == CallState::Connected {
                    debug!("Duplicate connect for call {}", record.call_id);
                } else {
                    record.state = CallState::Connected;
                    record.connected_at = Some(event.timestamp.max(record.started_at));
                    changes.push(CallChange::Connected);
                    info!("Call {} connected", record.call_id);

                    if record.is_ambiguous() && !record.contact_locked {
                        let routed = routing
                            .lookup(&record.normalized_number, now)
                            .map(str::to_string);
                        let resolved =
                            resolve_contact(&record.candidates, routed.as_deref()).cloned();
                        if !same_contact(&record.contact, &resolved) {
                            let previous = std::mem::replace(&mut record.contact, resolved);
                            changes.push(CallChange::ContactChanged { previous });
                        }
                    }
                }
            }
            CallEventState::Disconnected => {
                let floor = record.connected_at.unwrap_or(record.started_at);
                record.ended_at = Some(event.timestamp.max(floor));

                if record.state == CallState::Connected {
                    record.state = CallState::Finished;
                    changes.push(CallChange::Finished);
                    info!(
                        "Call {} finished after {:?}",
                        record.call_id,
                        record.duration().unwrap_or_default()
                    );
                } else {
                    record.state = CallState::Abandoned;
                    changes.push(CallChange::Abandoned);
                    info!("Call {} abandoned before answer", record.call_id);
                }
            }
            _ => {}
        }

        Ok(CallUpdate {
            record: record.clone(),
            changes,
        })
    }

    fn start_call(
        &mut self,
        event: &CallEvent,
        number: NormalizedNumber,
        candidates: Vec<Arc<Contact>>,
        now: Instant,
    ) -> CallUpdate {
        let pending = match event.direction {
            CallDirection::Outbound => self.take_pending(&number, now),
            CallDirection::Inbound => None,
        };

        let (contact, contact_locked) = match pending.as_ref().and_then(|p| p.contact.clone()) {
            Some(contact) => {
                self.routing.record(&number, &contact.id, now);
                (Some(contact), true)
            }
            None => {
                let routed = self.routing.lookup(&number, now);
                (resolve_contact(&candidates, routed).cloned(), false)
            }
        };

        let reconciled_from = pending.map(|p| p.pending_id);
        let mut record = CallRecord {
            call_id: event.call_id.clone(),
            direction: event.direction,
            transport: event.transport,
            remote_number: event.remote_number.clone(),
            normalized_number: number,
            candidates,
            contact,
            contact_locked,
            state: CallState::Offered,
            started_at: event.timestamp,
            connected_at: None,
            ended_at: None,
            last_activity: now,
            pending_id: reconciled_from.clone(),
        };

        let mut changes = vec![CallChange::Started {
            reconciled_from: reconciled_from.clone(),
        }];

        if event.state == CallEventState::Connected {
            record.state = CallState::Connected;
            record.connected_at = Some(event.timestamp);
            changes.push(CallChange::Connected);
        }

        info!(
            "Tracking {:?} call {} via {} from {} ({} candidates{})",
            record.direction,
            record.call_id,
            record.transport,
            MaskedNumber::from(record.remote_number.as_str()),
            record.candidates.len(),
            match &reconciled_from {
                Some(id) => format!(", confirms dial {id}"),
                None => String::new(),
            }
        );

        self.calls.insert(record.call_id.clone(), record.clone());

        CallUpdate { record, changes }
    }

    /// Oldest unexpired pending dial for `number`.
    fn take_pending(&mut self, number: &NormalizedNumber, now: Instant) -> Option<PendingCall> {
        if number.is_empty() {
            return None;
        }

        let timeout = self.settings.stale_pending_timeout;
        let pending_id = self
            .pending
            .values()
            .filter(|p| &p.normalized_number == number)
            .filter(|p| now.saturating_duration_since(p.created_at) < timeout)
            .min_by_key(|p| p.created_at)
            .map(|p| p.pending_id.clone())?;

        self.pending.remove(&pending_id)
    }

    /// Register an outbound dial before the transport confirms it.
    pub fn request_dial(
        &mut self,
        requested_number: &str,
        number: NormalizedNumber,
        contact: Option<Arc<Contact>>,
        now: Instant,
    ) -> PendingCall {
        let pending = PendingCall {
            pending_id: Uuid::new_v4().to_string(),
            requested_number: requested_number.to_string(),
            normalized_number: number,
            contact,
            requested_at: SystemTime::now(),
            created_at: now,
        };

        info!(
            "Dial {} requested to {}",
            pending.pending_id,
            MaskedNumber::from(requested_number)
        );

        self.pending
            .insert(pending.pending_id.clone(), pending.clone());
        pending
    }

    /// Pin `contact` to a call and remember it for the call's number.
    pub fn select_contact(
        &mut self,
        call_id: &str,
        contact: Arc<Contact>,
        now: Instant,
    ) -> Result<CallUpdate, CallError> {
        let record = self
            .calls
            .get_mut(call_id)
            .ok_or_else(|| CallError::protocol_violation(call_id, "contact selected for unknown call"))?;

        self.routing
            .record(&record.normalized_number, &contact.id, now);

        record.contact_locked = true;
        record.last_activity = now;

        let selected = Some(contact);
        let mut changes = Vec::new();
        if !same_contact(&record.contact, &selected) {
            let previous = std::mem::replace(&mut record.contact, selected);
            changes.push(CallChange::ContactChanged { previous });
        }

        Ok(CallUpdate {
            record: record.clone(),
            changes,
        })
    }

    /// Drop a terminal call whose completion has been taken care of.
    pub fn acknowledge(&mut self, call_id: &str) -> Result<CallRecord, CallError> {
        match self.calls.get(call_id).map(|record| record.state) {
            None => Err(CallError::protocol_violation(
                call_id,
                "acknowledged call is not tracked",
            )),
            Some(state) if !state.is_terminal() => Err(CallError::protocol_violation(
                call_id,
                format!("cannot acknowledge a call that is still {state}"),
            )),
            Some(_) => self.calls.remove(call_id).ok_or_else(|| {
                CallError::protocol_violation(call_id, "acknowledged call vanished")
            }),
        }
    }

    /// Remove stale pending dials, leaked live calls, expired terminal calls
    /// and expired routing entries.
    pub fn evict_stale(&mut self, now: Instant) -> Eviction {
        let settings = self.settings;
        let mut eviction = Eviction::default();

        let stale_pending: Vec<String> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.created_at) >= settings.stale_pending_timeout)
            .map(|p| p.pending_id.clone())
            .collect();

        for id in stale_pending {
            if let Some(pending) = self.pending.remove(&id) {
                warn!(
                    "Dial {} to {} never confirmed, abandoned",
                    pending.pending_id,
                    MaskedNumber::from(pending.requested_number.as_str())
                );
                eviction.pending.push(pending);
            }
        }

        let expired: Vec<String> = self
            .calls
            .values()
            .filter(|record| {
                let idle = now.saturating_duration_since(record.last_activity);
                if record.state.is_terminal() {
                    idle >= settings.finished_retention
                } else {
                    idle >= settings.stale_call_timeout
                }
            })
            .map(|record| record.call_id.clone())
            .collect();

        for id in expired {
            let Some(record) = self.calls.remove(&id) else {
                continue;
            };

            if record.state.is_terminal() {
                debug!("Call {} retention expired", record.call_id);
                eviction.expired_terminal.push(record);
            } else {
                warn!(
                    "Call {} evicted in state {} after {:?} without events",
                    record.call_id, record.state, settings.stale_call_timeout
                );
                eviction.stale_calls.push(record);
            }
        }

        eviction.routing_purged = self.routing.purge_expired(now);
        eviction
    }

    pub fn get(&self, call_id: &str) -> Option<&CallRecord> {
        self.calls.get(call_id)
    }

    /// Live calls plus pending dials (as `Pending` records), oldest first.
    pub fn active_calls(&self) -> Vec<CallRecord> {
        let mut active: Vec<CallRecord> = self
            .calls
            .values()
            .filter(|record| !record.state.is_terminal())
            .cloned()
            .chain(self.pending.values().map(PendingCall::as_record))
            .collect();
        active.sort_by_key(|record| record.started_at);
        active
    }

    pub fn pending_calls(&self) -> Vec<&PendingCall> {
        self.pending.values().collect()
    }

    pub fn terminal_calls(&self) -> Vec<&CallRecord> {
        self.calls
            .values()
            .filter(|record| record.state.is_terminal())
            .collect()
    }

    pub fn routed_contact(&self, number: &NormalizedNumber, now: Instant) -> Option<&str> {
        self.routing.lookup(number, now)
    }

    pub fn routing(&self) -> &LastContactRouting {
        &self.routing
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new(TrackerSettings::default())
    }
}

fn same_contact(a: &Option<Arc<Contact>>, b: &Option<Arc<Contact>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id == b.id,
        (None, None) => true,
        _ => false,
    }
}
