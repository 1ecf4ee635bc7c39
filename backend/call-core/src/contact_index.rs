//! Suffix-keyed contact lookup.
//!
//! A [`ContactIndex`] is built once per load cycle from the full contact list
//! and never mutated afterwards. [`SharedContactIndex`] holds the current one
//! behind an `Arc` so that a reload swaps the pointer in one step: readers
//! either keep the snapshot they already hold or pick up the new one, never a
//! half-built map.

use crate::normalizer::{NormalizedNumber, PhoneNormalizer};

use models::Contact;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, info};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ContactIndex {
    by_number: HashMap<NormalizedNumber, Vec<Arc<Contact>>>,
    by_id: HashMap<String, Arc<Contact>>,
    built_at: Option<SystemTime>,
}

impl ContactIndex {
    /// Build an index in one pass over `contacts`.
    ///
    /// Candidates for a key keep the order of the input list, which is the
    /// tie-break when several contacts share a suffix. Numbers that normalize
    /// to nothing are skipped so that they cannot act as wildcards.
    pub fn build(contacts: Vec<Contact>, normalizer: &PhoneNormalizer) -> Self {
        let mut by_number: HashMap<NormalizedNumber, Vec<Arc<Contact>>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(contacts.len());
        let mut skipped_numbers = 0usize;

        for contact in contacts {
            let contact = Arc::new(contact);

            for raw in &contact.numbers {
                let key = normalizer.normalize(raw);
                if key.is_empty() {
                    skipped_numbers += 1;
                    continue;
                }

                let candidates = by_number.entry(key).or_default();
                // Two numbers of one contact can collapse onto the same key.
                if !candidates.iter().any(|c| c.id == contact.id) {
                    candidates.push(Arc::clone(&contact));
                }
            }

            by_id.insert(contact.id.clone(), contact);
        }

        if skipped_numbers > 0 {
            debug!("Skipped {skipped_numbers} contact numbers without usable digits");
        }

        Self {
            by_number,
            by_id,
            built_at: Some(SystemTime::now()),
        }
    }

    /// Zero, one or many contacts registered under `number`.
    pub fn lookup(&self, number: &NormalizedNumber) -> &[Arc<Contact>] {
        if number.is_empty() {
            return &[];
        }

        self.by_number
            .get(number)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, contact_id: &str) -> Option<Arc<Contact>> {
        self.by_id.get(contact_id).cloned()
    }

    pub fn contact_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn key_count(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn built_at(&self) -> Option<SystemTime> {
        self.built_at
    }
}

/// The process-wide current index.
///
/// `Clone` shares the same slot.
#[derive(Clone, Default)]
pub struct SharedContactIndex {
    current: Arc<RwLock<Arc<ContactIndex>>>,
}

impl SharedContactIndex {
    pub fn new(index: ContactIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index as of now. Holding the snapshot does not block a reload.
    pub async fn snapshot(&self) -> Arc<ContactIndex> {
        Arc::clone(&*self.current.read().await)
    }

    /// Swap in a fully built index.
    pub async fn replace(&self, index: ContactIndex) {
        let contacts = index.contact_count();
        let keys = index.key_count();

        *self.current.write().await = Arc::new(index);

        info!("Contact index replaced: {contacts} contacts under {keys} numbers");
    }
}
