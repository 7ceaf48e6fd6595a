//! List-backed display for request browsers.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::display::{DisplaySink, ImmediateExecutor, UiExecutor};
use crate::export::{curl_description, CurlContext};
use crate::models::LoggedRequest;

pub const INVALID_INDEX: &str = "Invalid";

pub type AfterDisplayFn = Arc<dyn Fn(&LoggedRequest, &str) + Send + Sync>;

/// A titled action a UI can offer next to the request list.
#[derive(Clone)]
pub struct CustomAction {
    pub title: String,
    handler: Arc<dyn Fn() + Send + Sync>,
}

impl CustomAction {
    pub fn new<F>(title: impl Into<String>, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn run(&self) {
        (self.handler)()
    }
}

impl fmt::Debug for CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAction")
            .field("title", &self.title)
            .finish()
    }
}

/// Most-recent-first list of logged requests. Mutations go through the
/// configured [`UiExecutor`].
pub struct CollectionDisplay {
    entries: Arc<RwLock<Vec<LoggedRequest>>>,
    executor: Arc<dyn UiExecutor>,
    curl_context: CurlContext,
    after_display: Option<AfterDisplayFn>,
    actions: Vec<CustomAction>,
}

impl CollectionDisplay {
    pub fn new(executor: Arc<dyn UiExecutor>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            executor,
            curl_context: CurlContext::default(),
            after_display: None,
            actions: Vec::new(),
        }
    }

    pub fn immediate() -> Self {
        Self::new(Arc::new(ImmediateExecutor))
    }

    pub fn with_curl_context(mut self, context: CurlContext) -> Self {
        self.curl_context = context;
        self
    }

    /// Called on the UI context after an entry is inserted, with the entry
    /// and its curl command.
    pub fn with_after_display<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LoggedRequest, &str) + Send + Sync + 'static,
    {
        self.after_display = Some(Arc::new(callback));
        self
    }

    pub fn with_action(mut self, action: CustomAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(&self) -> &[CustomAction] {
        &self.actions
    }

    /// Snapshot of the displayed entries, most recent first.
    pub fn entries(&self) -> Vec<LoggedRequest> {
        self.read(|entries| entries.to_vec())
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number shown next to the row at `index`: the entry's sequence id.
    pub fn request_display_number(&self, index: usize) -> Option<u64> {
        self.read(|entries| entries.get(index).map(LoggedRequest::sequence_id))
    }

    pub fn curl_description_at(&self, index: usize) -> String {
        self.read(|entries| match entries.get(index) {
            Some(entry) => curl_description(entry.request(), &self.curl_context),
            None => INVALID_INDEX.to_string(),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&[LoggedRequest]) -> T) -> T {
        match self.entries.read() {
            Ok(entries) => f(&entries),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl DisplaySink for CollectionDisplay {
    fn display_request(&self, request: &LoggedRequest) {
        let entries = Arc::clone(&self.entries);
        let entry = request.clone();
        let curl = curl_description(request.request(), &self.curl_context);
        let after_display = self.after_display.clone();
        self.executor.execute(Box::new(move || {
            entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(0, entry.clone());
            if let Some(callback) = after_display {
                callback(&entry, &curl);
            }
        }));
    }

    fn clear(&self) {
        let entries = Arc::clone(&self.entries);
        self.executor.execute(Box::new(move || {
            entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }));
    }
}

impl fmt::Debug for CollectionDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDisplay")
            .field("entries", &self.len())
            .field("actions", &self.actions)
            .finish()
    }
}
