//! Console diagnostic channel
//!
//! Togglable line logger used for lifecycle diagnostics and the console
//! display. Every emitted line carries [`CONSOLE_TAG`].

use std::sync::atomic::{AtomicBool, Ordering};

pub const CONSOLE_TAG: &str = "[netlog]";

#[derive(Debug)]
pub struct ConsoleLogger {
    is_on: AtomicBool,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ConsoleLogger {
    pub fn new(is_on: bool) -> Self {
        Self {
            is_on: AtomicBool::new(is_on),
        }
    }

    pub fn turn(&self, on: bool) {
        self.is_on.store(on, Ordering::SeqCst);
    }

    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::SeqCst)
    }

    /// Emit `message` with the console tag. Returns the emitted line, or an
    /// empty string when the channel is off.
    pub fn log(&self, message: &str) -> String {
        if !self.is_on() {
            return String::new();
        }
        let line = format!("{} {}", CONSOLE_TAG, message);
        tracing::info!(target: "netlog::console", "{}", line);
        line
    }
}
