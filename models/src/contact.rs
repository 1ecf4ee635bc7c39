use serde::{Deserialize, Serialize};

/// Where a contact came from. Closed set; the CRM uses it to pick the record type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ContactOrigin {
    #[default]
    PrimaryDirectory,
    Institution,
    UnmatchedFallback,
}

/// One entry of the contact directory.
///
/// Immutable once loaded. A reload replaces the whole directory, it never
/// edits contacts in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub origin: ContactOrigin,
    #[serde(default)]
    pub numbers: Vec<String>,
}

impl Contact {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        origin: ContactOrigin,
        numbers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origin,
            numbers: numbers.into_iter().map(Into::into).collect(),
        }
    }
}
