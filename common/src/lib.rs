//! Shared building blocks for the call bridge crates.
//!
//! Nothing in here knows about calls or contacts. It holds the pieces every
//! layer needs the same way:
//!
//! - [`ErrorLocation`] for errors that say where they were raised
//! - [`HttpStatusCode`] for classifying answers from HTTP collaborators
//! - [`MaskedNumber`] for writing phone numbers to logs

pub mod error;
pub mod http_status;
pub mod masked_number;

pub use error::error_location::ErrorLocation;
pub use http_status::HttpStatusCode;
pub use masked_number::MaskedNumber;

#[cfg(test)]
mod tests;
