pub mod call_tracker;
pub mod circuit_breaker;
pub mod config;
pub mod contact_index;
pub mod contacts;
pub mod crm_client;
pub mod error;
pub mod normalizer;
pub mod notifier;
pub mod orchestrator;
pub mod retry;
pub mod routing;
pub mod status;

#[cfg(test)]
mod tests;

pub const CALLBRIDGE_NAME: &str = "callbridge";
pub const USER_AGENT: &str =
    const_format::concatcp!(CALLBRIDGE_NAME, "/", env!("CARGO_PKG_VERSION"));
