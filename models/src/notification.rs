use crate::timestamp;
use crate::{CallDirection, CallState};

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The four event types the CRM understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NewCall,
    CallStateChanged,
    ContactChanged,
    NewJournal,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NotificationKind::NewCall => "new-call",
            NotificationKind::CallStateChanged => "call-state-changed",
            NotificationKind::ContactChanged => "contact-changed",
            NotificationKind::NewJournal => "new-journal",
        };
        f.write_str(name)
    }
}

/// One outbound notification for the CRM channel.
///
/// Contact id and name are empty strings when nothing matched; the CRM
/// treats that as "unknown caller".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub call_id: String,
    pub direction: CallDirection,
    pub state: CallState,
    pub remote_number: String,
    pub contact_id: String,
    pub contact_name: String,
    #[serde(with = "timestamp::option", default)]
    pub began_at: Option<SystemTime>,
    #[serde(with = "timestamp::option", default)]
    pub ended_at: Option<SystemTime>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

impl Notification {
    pub fn is_matched(&self) -> bool {
        !self.contact_id.is_empty()
    }
}
