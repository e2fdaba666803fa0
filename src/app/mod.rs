pub mod keyboard_input;

mod orchestrator;
mod presentation;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod summary;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::{SentryOrchestrator, ShutdownHandle};
pub use presentation::PresentationLoop;
pub use summary::{format_runtime, RunSummary};
pub use state::ComponentRegistry;
pub use types::{Component, ComponentState, ShutdownReason};
