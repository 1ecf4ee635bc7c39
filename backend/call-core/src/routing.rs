//! Last-contact routing.
//!
//! When several contacts share a number suffix, the one most recently
//! confirmed for that number (picked by the user, or supplied with a dial
//! request) wins over list order. Entries expire after `window`; a zero
//! window switches the feature off.

use crate::normalizer::NormalizedNumber;

use models::Contact;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

pub const DEFAULT_ROUTING_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    pub contact_id: String,
    pub recorded_at: Instant,
}

#[derive(Debug)]
pub struct LastContactRouting {
    window: Duration,
    entries: HashMap<NormalizedNumber, RoutingEntry>,
}

impl LastContactRouting {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    pub fn record(&mut self, number: &NormalizedNumber, contact_id: &str, now: Instant) {
        if !self.is_enabled() || number.is_empty() {
            return;
        }

        debug!("Routing {number} to contact {contact_id}");
        self.entries.insert(
            number.clone(),
            RoutingEntry {
                contact_id: contact_id.to_string(),
                recorded_at: now,
            },
        );
    }

    /// The routed contact id for `number`, if an unexpired entry exists.
    pub fn lookup(&self, number: &NormalizedNumber, now: Instant) -> Option<&str> {
        if !self.is_enabled() {
            return None;
        }

        self.entries
            .get(number)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.contact_id.as_str())
    }

    /// Drop expired entries, returning how many went.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.recorded_at) < window);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &RoutingEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.recorded_at) >= self.window
    }
}

impl Default for LastContactRouting {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTING_WINDOW)
    }
}

/// Pick the contact for a call from its lookup candidates.
///
/// A single candidate is taken as-is. With several, a routed id naming one
/// of them wins; otherwise the first candidate in index order.
pub fn resolve_contact<'a>(
    candidates: &'a [Arc<Contact>],
    routed_contact_id: Option<&str>,
) -> Option<&'a Arc<Contact>> {
    if candidates.len() > 1
        && let Some(routed) = routed_contact_id
        && let Some(contact) = candidates.iter().find(|c| c.id == routed)
    {
        return Some(contact);
    }

    candidates.first()
}
