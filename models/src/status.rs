use crate::timestamp;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Aggregate connectivity shown to the user.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityState {
    FullyOperational,
    Partial,
    #[default]
    Disconnected,
}

/// Published whenever connectivity or the last contact sync changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub connectivity: ConnectivityState,
    pub crm_available: bool,
    #[serde(with = "timestamp::option", default)]
    pub last_sync: Option<SystemTime>,
}
