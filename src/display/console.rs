use std::sync::Arc;

use crate::console::ConsoleLogger;
use crate::display::DisplaySink;
use crate::models::LoggedRequest;

/// Writes one line per logged request to a [`ConsoleLogger`].
#[derive(Debug, Clone)]
pub struct ConsoleDisplay {
    console: Arc<ConsoleLogger>,
}

impl ConsoleDisplay {
    pub fn new(console: Arc<ConsoleLogger>) -> Self {
        Self { console }
    }

    pub fn line_for(request: &LoggedRequest) -> String {
        format!(
            "Request #{}: URL => {} {}",
            request.sequence_id(),
            request.method(),
            request.url()
        )
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new(Arc::new(ConsoleLogger::new(true)))
    }
}

impl DisplaySink for ConsoleDisplay {
    fn display_request(&self, request: &LoggedRequest) {
        self.console.log(&Self::line_for(request));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, Request};

    #[test]
    fn formats_request_line() {
        let logged = LoggedRequest::new(3, Request::new(HttpMethod::Post, "https://a.com/x"));
        assert_eq!(
            ConsoleDisplay::line_for(&logged),
            "Request #3: URL => POST https://a.com/x"
        );
    }
}
