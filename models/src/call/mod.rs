pub mod builder;

use crate::timestamp;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    #[default]
    Inbound,
    Outbound,
}

/// The adapter an event arrived through.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Line-monitoring telephony API.
    LineMonitor,
    /// Local inter-process pipe from a softphone.
    Pipe,
    /// Socket channel fed by the browser extension.
    Browser,
    #[default]
    External,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::LineMonitor => "line-monitor",
            TransportKind::Pipe => "pipe",
            TransportKind::Browser => "browser",
            TransportKind::External => "external",
        };
        f.write_str(name)
    }
}

/// State reported by a transport, before mapping into the canonical lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CallEventState {
    Offered,
    Ringing,
    Dialing,
    Connected,
    Disconnected,
}

impl CallEventState {
    /// Offered, ringing and dialing all announce a call that is not yet connected.
    pub fn is_announcement(&self) -> bool {
        matches!(
            self,
            CallEventState::Offered | CallEventState::Ringing | CallEventState::Dialing
        )
    }
}

/// Canonical call lifecycle every transport is mapped into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Pending,
    Offered,
    Connected,
    Finished,
    Abandoned,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Finished | CallState::Abandoned)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallState::Pending => "pending",
            CallState::Offered => "offered",
            CallState::Connected => "connected",
            CallState::Finished => "finished",
            CallState::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// A normalized call event as emitted by a transport adapter.
///
/// `remote_number` is the raw number as the transport saw it; it may be empty
/// for follow-up events (connected, disconnected) and for withheld callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    pub call_id: String,
    #[serde(default)]
    pub direction: CallDirection,
    #[serde(default)]
    pub remote_number: String,
    pub state: CallEventState,
    #[serde(with = "timestamp", default = "SystemTime::now")]
    pub timestamp: SystemTime,
    #[serde(default)]
    pub transport: TransportKind,
}
