pub mod call;
pub mod config;
pub mod contact_source;
pub mod notify;
pub mod orchestrator;

pub use call::CallError;
pub use contact_source::ContactSourceError;
pub use notify::NotifyError;
pub use orchestrator::OrchestratorError;

