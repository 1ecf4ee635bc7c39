//! Serde adapters writing `SystemTime` as RFC 3339 text.
//!
//! Transports and the CRM exchange human-readable timestamps; the default
//! serde representation of `SystemTime` (seconds + nanos struct) is not
//! something either side understands.

use std::time::SystemTime;

use humantime::{format_rfc3339_millis, parse_rfc3339_weak};
use serde::{Deserialize, Deserializer, Serializer, de::Error as DeError};

pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&format_rfc3339_millis(*time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_rfc3339_weak(&text).map_err(DeError::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => serializer.collect_str(&format_rfc3339_millis(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| parse_rfc3339_weak(&text).map_err(DeError::custom))
            .transpose()
    }
}
