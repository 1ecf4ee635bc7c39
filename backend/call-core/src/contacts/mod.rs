//! Bulk contact loading.
//!
//! A [`ContactSource`] produces the full contact list in one go; the
//! [`ContactLoader`] wraps it in the retry policy and a per-attempt timeout and
//! swaps a freshly built index in when it succeeds.

pub mod file_source;
pub mod http_source;
pub mod loader;

pub use file_source::FileContactSource;
pub use http_source::HttpContactSource;
pub use loader::ContactLoader;

use crate::error::contact_source::ContactSourceError;

use models::Contact;

use async_trait::async_trait;

#[async_trait]
pub trait ContactSource: Send + Sync {
    /// Fetch every contact. An empty list is a valid answer.
    async fn fetch(&self) -> Result<Vec<Contact>, ContactSourceError>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}
