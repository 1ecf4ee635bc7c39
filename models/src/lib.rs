//! Domain models for the call bridge.
//!
//! Pure data shared between the transport adapters, the core and the CRM
//! side. Models have no business logic; normalization, matching and the call
//! lifecycle live in `call-core`.
//!
//! - [`Contact`]: one entry of the bulk-loaded contact directory
//! - [`CallEvent`]: a provider-agnostic call event from a transport adapter
//! - [`Notification`]: what gets forwarded to the CRM
//! - [`StatusSnapshot`]: aggregate connectivity for whoever displays it

pub mod call;
pub mod contact;
pub mod error;
pub mod notification;
pub mod status;
pub mod timestamp;

pub use call::builder::CallEventBuilder;
pub use call::{CallDirection, CallEvent, CallEventState, CallState, TransportKind};
pub use contact::{Contact, ContactOrigin};
pub use error::model_error::ModelError;
pub use notification::{Notification, NotificationKind};
pub use status::{ConnectivityState, StatusSnapshot};

#[cfg(test)]
mod tests;
