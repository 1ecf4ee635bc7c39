//! Aggregate connectivity, published for whoever displays it.
//!
//! Transports report themselves up or down, the notifier reports whether the
//! CRM channel is usable, the contact loader reports successful syncs. The
//! board folds that into one [`StatusSnapshot`] and publishes it on a
//! `watch` channel, only when the value actually changes.

use models::{ConnectivityState, StatusSnapshot, TransportKind};

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use log::info;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct BoardInner {
    transports: BTreeMap<TransportKind, bool>,
    crm_available: bool,
    last_sync: Option<SystemTime>,
}

#[derive(Debug)]
pub struct StatusBoard {
    inner: Mutex<BoardInner>,
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let inner = BoardInner {
            crm_available: true,
            ..Default::default()
        };
        let (tx, _rx) = watch::channel(snapshot_of(&inner));
        Self {
            inner: Mutex::new(inner),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_transport(&self, transport: TransportKind, connected: bool) {
        let mut inner = self.lock();
        if inner.transports.insert(transport, connected) != Some(connected) {
            info!(
                "Transport {transport} {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
        self.publish(&inner);
    }

    pub fn set_crm_available(&self, available: bool) {
        let mut inner = self.lock();
        inner.crm_available = available;
        self.publish(&inner);
    }

    pub fn mark_synced(&self, at: SystemTime) {
        let mut inner = self.lock();
        inner.last_sync = Some(at);
        self.publish(&inner);
    }

    fn publish(&self, inner: &BoardInner) {
        let next = snapshot_of(inner);

        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.connectivity != next.connectivity {
                info!(
                    "Connectivity {:?} -> {:?}",
                    current.connectivity, next.connectivity
                );
            }
            *current = next;
            true
        });
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(inner: &BoardInner) -> StatusSnapshot {
    StatusSnapshot {
        connectivity: aggregate(&inner.transports, inner.crm_available),
        crm_available: inner.crm_available,
        last_sync: inner.last_sync,
    }
}

/// Every transport up and the CRM reachable is fully operational; no
/// transport up is disconnected; anything in between is partial.
pub fn aggregate(
    transports: &BTreeMap<TransportKind, bool>,
    crm_available: bool,
) -> ConnectivityState {
    let up = transports.values().filter(|connected| **connected).count();

    if up == 0 {
        ConnectivityState::Disconnected
    } else if up == transports.len() && crm_available {
        ConnectivityState::FullyOperational
    } else {
        ConnectivityState::Partial
    }
}
