//! Display sinks
//!
//! Renderers of logged requests. The logger core forwards every accepted
//! request to its attached sink and tells it when the log is cleared.

pub mod collection;
pub mod console;
pub mod executor;

pub use collection::{CollectionDisplay, CustomAction, INVALID_INDEX};
pub use console::ConsoleDisplay;
pub use executor::{ImmediateExecutor, QueuedExecutor, UiExecutor};

use crate::models::LoggedRequest;

pub trait DisplaySink: Send + Sync {
    fn display_request(&self, request: &LoggedRequest);

    fn clear(&self) {}
}
