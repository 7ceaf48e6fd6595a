//! The interception hook
//!
//! First-in-line handler that observes every request submitted through a
//! transport while installed. It never takes ownership of a request: its
//! only side effect is publishing a marked copy on the dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::intercept::registry::HookInstaller;
use crate::intercept::transport::RequestHandler;
use crate::models::Request;
use crate::redirect::RedirectTable;

/// Property key stamped on requests the hook has already seen.
pub const SEEN_MARKER: &str = "netlog.intercepted";

pub struct InterceptionHook {
    id: Uuid,
    name: String,
    dispatcher: Arc<Dispatcher>,
    redirects: RwLock<RedirectTable>,
    published: AtomicU64,
}

impl InterceptionHook {
    pub fn new(name: impl Into<String>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            dispatcher,
            redirects: RwLock::new(RedirectTable::new()),
            published: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Whether `request` carries the seen marker.
    pub fn is_marked(request: &Request) -> bool {
        request.property(SEEN_MARKER).is_some()
    }

    /// Number of requests this hook has published.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn set_redirects(&self, table: RedirectTable) {
        match self.redirects.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    pub fn install(self: &Arc<Self>, installer: &dyn HookInstaller) -> bool {
        installer.install(Arc::clone(self))
    }

    pub fn uninstall(&self, installer: &dyn HookInstaller) -> bool {
        installer.uninstall(self.id)
    }
}

impl RequestHandler for InterceptionHook {
    fn name(&self) -> &str {
        &self.name
    }

    /// Always declines ownership. A request that is neither marked nor
    /// header-less is published once, as a marked copy.
    fn should_intercept(&self, request: &Request) -> bool {
        if Self::is_marked(request) || !request.has_headers() {
            return false;
        }
        let observed = self.canonicalize(request.clone());
        self.published.fetch_add(1, Ordering::SeqCst);
        let receivers = self.dispatcher.publish(observed);
        tracing::trace!(
            "Hook '{}' published {} {} to {} subscriber(s)",
            self.name,
            request.method,
            request.url,
            receivers
        );
        false
    }

    fn canonicalize(&self, mut request: Request) -> Request {
        request.set_property(SEEN_MARKER, "YES");
        request
    }

    /// A request this hook published travels on marked.
    fn passed_on(&self, request: Request) -> Request {
        if request.has_headers() {
            self.canonicalize(request)
        } else {
            request
        }
    }

    fn redirected_request(&self, request: &Request) -> Option<Request> {
        match self.redirects.read() {
            Ok(table) => table.redirected_request(request),
            Err(poisoned) => poisoned.into_inner().redirected_request(request),
        }
    }
}

impl fmt::Debug for InterceptionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionHook")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("published", &self.published_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RequestObserver;
    use std::sync::Mutex;

    fn hook_with_recorder() -> (InterceptionHook, Arc<Dispatcher>, Arc<Mutex<Vec<Request>>>) {
        let dispatcher = Arc::new(Dispatcher::new("hook-test"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Arc<dyn RequestObserver> = Arc::new(move |request: &Request| {
            sink.lock().unwrap().push(request.clone());
        });
        dispatcher.subscribe(observer).unwrap();
        (
            InterceptionHook::new("test", dispatcher.clone()),
            dispatcher,
            seen,
        )
    }

    #[test]
    fn publishes_marked_copy_and_declines() {
        let (hook, dispatcher, seen) = hook_with_recorder();
        let request = Request::get("https://a.com").with_header("Accept", "*/*");

        assert!(!hook.should_intercept(&request));
        dispatcher.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(InterceptionHook::is_marked(&seen[0]));
        assert!(!InterceptionHook::is_marked(&request));
        assert_eq!(hook.published_count(), 1);
    }

    #[test]
    fn ignores_marked_and_headerless_requests() {
        let (hook, dispatcher, seen) = hook_with_recorder();
        let marked = hook.canonicalize(Request::get("https://a.com").with_header("A", "1"));

        assert!(!hook.should_intercept(&marked));
        assert!(!hook.should_intercept(&Request::get("https://b.com")));
        dispatcher.flush();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(hook.published_count(), 0);
    }

    #[test]
    fn passes_on_marked_copy_only_when_published() {
        let hook = InterceptionHook::new("test", Arc::new(Dispatcher::new("unused")));
        let passed = hook.passed_on(Request::get("https://a.com").with_header("A", "1"));
        assert!(InterceptionHook::is_marked(&passed));
        assert!(!InterceptionHook::is_marked(&hook.passed_on(Request::get("https://a.com"))));
    }

    #[test]
    fn canonicalize_stamps_marker() {
        let hook = InterceptionHook::new("test", Arc::new(Dispatcher::new("unused")));
        let stamped = hook.canonicalize(Request::get("https://a.com"));
        assert_eq!(stamped.property(SEEN_MARKER), Some("YES"));
    }
}
