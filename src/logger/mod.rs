//! Logger core
//!
//! [`NetworkLogger`] owns the logging session: it installs the interception
//! hook while logging, receives published requests from the dispatcher,
//! filters them, numbers and stores the accepted ones, and forwards them to
//! the attached display sink, the after-log callback and live subscribers.
//!
//! One mutex guards the logging flag, the counter and the log, so state
//! transitions and acceptance never interleave: once `stop()` returns no
//! further request is accepted.
//!
//! A second mutex serializes "assign id, then notify" and "empty the log,
//! then clear the display", so sinks see requests in id order and a clear
//! never races an acceptance. Sinks and callbacks run under it and must not
//! log or clear through the same logger.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::LoggerConfig;
use crate::console::ConsoleLogger;
use crate::dispatch::{panic_message, Dispatcher, RequestObserver, SubscriptionId};
use crate::display::DisplaySink;
use crate::filter::{FilterChain, RequestFilter};
use crate::intercept::{HookInstaller, HookRegistry, InterceptionHook};
use crate::models::{LoggedRequest, Request};
use crate::redirect::RedirectTable;

pub const ALREADY_STARTED: &str = "Attempt to `start` while already started. Returning.";
pub const ALREADY_STOPPED: &str = "Attempt to `stop` while already stopped. Returning.";

pub type AfterLogFn = Arc<dyn Fn(&LoggedRequest) + Send + Sync>;

/// Why a request was not recorded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LogRejection {
    #[error("logger is not logging")]
    NotLogging,
    #[error("request rejected by the filter chain")]
    FilteredOut,
}

#[derive(Debug, Default)]
struct LoggerState {
    is_logging: bool,
    request_count: u64,
    /// Most recent first.
    requests: VecDeque<LoggedRequest>,
}

pub struct NetworkLogger {
    state: Mutex<LoggerState>,
    notify_lock: Mutex<()>,
    filters: RwLock<FilterChain>,
    hook: Arc<InterceptionHook>,
    installer: Arc<dyn HookInstaller>,
    dispatcher: Arc<Dispatcher>,
    subscription: Mutex<Option<SubscriptionId>>,
    display: RwLock<Option<Arc<dyn DisplaySink>>>,
    after_log: RwLock<Option<AfterLogFn>>,
    console: Arc<ConsoleLogger>,
    traffic: broadcast::Sender<LoggedRequest>,
    max_entries: usize,
    weak_self: Weak<NetworkLogger>,
}

/// Dispatcher subscription of a logger. Holds the logger weakly so a
/// pending delivery never keeps it alive.
struct LoggerObserver {
    logger: Weak<NetworkLogger>,
}

impl RequestObserver for LoggerObserver {
    fn on_request(&self, request: &Request) {
        if let Some(logger) = self.logger.upgrade() {
            if let Err(rejection) = logger.log_request(request.clone()) {
                tracing::trace!("{} {} not logged: {}", request.method, request.url, rejection);
            }
        }
    }
}

impl NetworkLogger {
    /// Logger wired to the process-wide hook registry and dispatcher.
    pub fn new(config: &LoggerConfig) -> Arc<Self> {
        Self::with_filter(config, None)
    }

    /// Like [`new`](Self::new), with `custom` appended to the configured
    /// filter chain.
    pub fn with_filter(config: &LoggerConfig, custom: Option<RequestFilter>) -> Arc<Self> {
        Self::with_parts(
            config,
            config.filter_chain(custom),
            HookRegistry::global(),
            Dispatcher::global(),
        )
    }

    pub fn with_parts(
        config: &LoggerConfig,
        filters: FilterChain,
        installer: Arc<dyn HookInstaller>,
        dispatcher: Arc<Dispatcher>,
    ) -> Arc<Self> {
        let (traffic, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let hook = Arc::new(InterceptionHook::new("netlog", Arc::clone(&dispatcher)));
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(LoggerState::default()),
            notify_lock: Mutex::new(()),
            filters: RwLock::new(filters),
            hook,
            installer,
            dispatcher,
            subscription: Mutex::new(None),
            display: RwLock::new(None),
            after_log: RwLock::new(None),
            console: Arc::new(ConsoleLogger::new(config.verbose)),
            traffic,
            max_entries: config.max_entries.max(1),
            weak_self: weak_self.clone(),
        })
    }

    /// Begin logging. Returns `false` when already logging or when the
    /// dispatcher subscription cannot be created.
    pub fn start(&self) -> bool {
        let mut state = self.lock_state();
        self.start_locked(&mut state)
    }

    fn start_locked(&self, state: &mut LoggerState) -> bool {
        if state.is_logging {
            self.console.log(ALREADY_STARTED);
            return false;
        }

        let observer = Arc::new(LoggerObserver {
            logger: self.weak_self.clone(),
        });
        let id = match self.dispatcher.subscribe(observer) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to start logging: {}", e);
                return false;
            }
        };
        self.hook.install(self.installer.as_ref());
        *self.lock_subscription() = Some(id);
        state.is_logging = true;

        tracing::info!("Network logging started ({})", id);
        self.console.log("Started logging");
        true
    }

    /// End logging. Returns `false` when already stopped.
    pub fn stop(&self) -> bool {
        let mut state = self.lock_state();
        self.stop_locked(&mut state)
    }

    fn stop_locked(&self, state: &mut LoggerState) -> bool {
        if !state.is_logging {
            self.console.log(ALREADY_STOPPED);
            return false;
        }

        self.hook.uninstall(self.installer.as_ref());
        if let Some(id) = self.lock_subscription().take() {
            self.dispatcher.unsubscribe(id);
        }
        state.is_logging = false;

        tracing::info!("Network logging stopped");
        self.console.log("Stopped logging");
        true
    }

    /// Stop if logging, start otherwise. Returns the new logging state.
    pub fn toggle(&self) -> bool {
        let mut state = self.lock_state();
        if state.is_logging {
            self.stop_locked(&mut state);
        } else {
            self.start_locked(&mut state);
        }
        state.is_logging
    }

    pub fn log_request(&self, request: Request) -> Result<LoggedRequest, LogRejection> {
        let _notify = self.lock_notify();
        let logged = {
            let mut state = self.lock_state();
            if !state.is_logging {
                return Err(LogRejection::NotLogging);
            }
            if !self.filter_chain().allows(&request) {
                return Err(LogRejection::FilteredOut);
            }
            state.request_count += 1;
            let logged = LoggedRequest::new(state.request_count, request);
            state.requests.push_front(logged.clone());
            state.requests.truncate(self.max_entries);
            logged
        };

        tracing::debug!("Logged {}", logged.summary());
        self.notify(&logged);
        Ok(logged)
    }

    /// Log a synthetic `GET` for `url`.
    pub fn mock_request(&self, url: &str) -> Result<LoggedRequest, LogRejection> {
        self.log_request(Request::get(url))
    }

    /// Empty the log. The request counter keeps counting.
    pub fn clear(&self) {
        let _notify = self.lock_notify();
        self.lock_state().requests.clear();
        if let Some(display) = self.display() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| display.clear()));
            if let Err(payload) = result {
                tracing::error!("Display sink panicked on clear: {}", panic_message(&*payload));
            }
        }
        self.console.log("Cleared logged requests");
    }

    pub fn is_logging(&self) -> bool {
        self.lock_state().is_logging
    }

    pub fn request_count(&self) -> u64 {
        self.lock_state().request_count
    }

    /// Snapshot of the log, most recent first.
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.lock_state().requests.iter().cloned().collect()
    }

    pub fn request(&self, sequence_id: u64) -> Option<LoggedRequest> {
        self.lock_state()
            .requests
            .iter()
            .find(|logged| logged.sequence_id() == sequence_id)
            .cloned()
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.console.turn(verbose);
    }

    pub fn verbose(&self) -> bool {
        self.console.is_on()
    }

    pub fn console(&self) -> &Arc<ConsoleLogger> {
        &self.console
    }

    pub fn hook(&self) -> &Arc<InterceptionHook> {
        &self.hook
    }

    pub fn set_redirects(&self, table: RedirectTable) {
        self.hook.set_redirects(table);
    }

    pub fn set_filters(&self, filters: FilterChain) {
        *self
            .filters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = filters;
    }

    /// Replace the display sink; `None` detaches it.
    pub fn attach_display(&self, display: Option<Arc<dyn DisplaySink>>) {
        *self
            .display
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = display;
    }

    pub fn set_after_log<F>(&self, callback: F)
    where
        F: Fn(&LoggedRequest) + Send + Sync + 'static,
    {
        *self
            .after_log
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(callback));
    }

    /// Live feed of every accepted request.
    pub fn subscribe_logged(&self) -> broadcast::Receiver<LoggedRequest> {
        self.traffic.subscribe()
    }

    fn notify(&self, logged: &LoggedRequest) {
        if let Some(display) = self.display() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| display.display_request(logged)));
            if let Err(payload) = result {
                tracing::error!(
                    "Display sink panicked on request #{}: {}",
                    logged.sequence_id(),
                    panic_message(&*payload)
                );
            }
        }

        let after_log = self
            .after_log
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        if let Some(callback) = after_log {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(logged)));
            if let Err(payload) = result {
                tracing::error!(
                    "After-log callback panicked on request #{}: {}",
                    logged.sequence_id(),
                    panic_message(&*payload)
                );
            }
        }

        // No live receivers is not an error.
        let _ = self.traffic.send(logged.clone());
    }

    fn display(&self) -> Option<Arc<dyn DisplaySink>> {
        self.display
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn filter_chain(&self) -> FilterChain {
        self.filters
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn lock_state(&self) -> MutexGuard<'_, LoggerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_notify(&self) -> MutexGuard<'_, ()> {
        self.notify_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<SubscriptionId>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for NetworkLogger {
    fn drop(&mut self) {
        if let Some(id) = self.lock_subscription().take() {
            self.dispatcher.unsubscribe(id);
        }
        self.hook.uninstall(self.installer.as_ref());
    }
}

impl fmt::Debug for NetworkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("NetworkLogger")
            .field("is_logging", &state.is_logging)
            .field("request_count", &state.request_count)
            .field("stored", &state.requests.len())
            .field("hook", &self.hook.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::CollectionDisplay;
    use crate::intercept::RequestHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Counts install calls before delegating to a private registry.
    #[derive(Default)]
    struct RecordingInstaller {
        registry: HookRegistry,
        installs: AtomicUsize,
    }

    impl HookInstaller for RecordingInstaller {
        fn install(&self, hook: Arc<InterceptionHook>) -> bool {
            self.installs.fetch_add(1, Ordering::SeqCst);
            self.registry.install(hook)
        }

        fn uninstall(&self, hook_id: Uuid) -> bool {
            self.registry.uninstall(hook_id)
        }
    }

    fn logger_with(config: LoggerConfig) -> (Arc<NetworkLogger>, Arc<RecordingInstaller>) {
        let installer = Arc::new(RecordingInstaller::default());
        let logger = NetworkLogger::with_parts(
            &config,
            config.filter_chain(None),
            installer.clone(),
            Arc::new(Dispatcher::new("logger-test")),
        );
        (logger, installer)
    }

    fn logger() -> Arc<NetworkLogger> {
        logger_with(LoggerConfig::default()).0
    }

    #[test]
    fn stores_most_recent_first_with_one_based_ids() {
        let logger = logger();
        logger.start();
        for url in ["https://a.com", "https://b.com", "https://c.com"] {
            logger.mock_request(url).unwrap();
        }

        let ids: Vec<u64> = logger.requests().iter().map(|r| r.sequence_id()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(logger.requests()[0].url(), "https://c.com");
        assert_eq!(logger.request_count(), 3);
        assert_eq!(logger.request(2).unwrap().url(), "https://b.com");
        assert!(logger.request(9).is_none());
    }

    #[test]
    fn non_http_requests_are_filtered_out() {
        let logger = logger();
        logger.start();

        assert_eq!(logger.mock_request("https://a.com").unwrap().sequence_id(), 1);
        assert_eq!(
            logger.mock_request("ftp://b.com").unwrap_err(),
            LogRejection::FilteredOut
        );
        assert_eq!(logger.mock_request("http://c.com").unwrap().sequence_id(), 2);

        let urls: Vec<String> = logger.requests().iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["http://c.com", "https://a.com"]);
    }

    #[test]
    fn start_is_idempotent() {
        let (logger, installer) = logger_with(LoggerConfig::default());
        assert!(logger.start());
        assert!(!logger.start());
        assert_eq!(installer.installs.load(Ordering::SeqCst), 1);
        assert_eq!(installer.registry.len(), 1);

        assert!(logger.stop());
        assert!(!logger.stop());
        assert!(installer.registry.is_empty());
    }

    #[test]
    fn stopped_logger_rejects_requests() {
        let logger = logger();
        assert_eq!(
            logger.mock_request("https://a.com").unwrap_err(),
            LogRejection::NotLogging
        );

        logger.start();
        logger.mock_request("https://a.com").unwrap();
        logger.stop();
        assert_eq!(
            logger.mock_request("https://b.com").unwrap_err(),
            LogRejection::NotLogging
        );
        assert_eq!(logger.request_count(), 1);
    }

    #[test]
    fn clear_keeps_the_counter() {
        let logger = logger();
        let display = Arc::new(CollectionDisplay::immediate());
        logger.attach_display(Some(display.clone()));
        logger.start();
        logger.mock_request("https://a.com").unwrap();
        logger.mock_request("https://b.com").unwrap();
        assert_eq!(display.len(), 2);

        logger.clear();
        assert!(logger.requests().is_empty());
        assert!(display.is_empty());
        assert_eq!(logger.request_count(), 2);
        assert_eq!(logger.mock_request("https://c.com").unwrap().sequence_id(), 3);
    }

    #[test]
    fn display_order_matches_log_order_under_concurrent_logging() {
        let logger = logger();
        let display = Arc::new(CollectionDisplay::immediate());
        logger.attach_display(Some(display.clone()));
        logger.start();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        logger.mock_request(&format!("https://t{t}.com/{i}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let logged: Vec<u64> = logger.requests().iter().map(|r| r.sequence_id()).collect();
        let shown: Vec<u64> = display.entries().iter().map(|r| r.sequence_id()).collect();
        assert_eq!(logged.len(), 200);
        assert_eq!(shown, logged);
        assert_eq!(logged, (1..=200).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn clear_empties_log_and_display_together() {
        let logger = logger();
        let display = Arc::new(CollectionDisplay::immediate());
        logger.attach_display(Some(display.clone()));
        logger.start();

        let writer = {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    logger.mock_request(&format!("https://a.com/{i}")).unwrap();
                }
            })
        };
        for _ in 0..20 {
            logger.clear();
        }
        writer.join().unwrap();

        let logged: Vec<u64> = logger.requests().iter().map(|r| r.sequence_id()).collect();
        let shown: Vec<u64> = display.entries().iter().map(|r| r.sequence_id()).collect();
        assert_eq!(shown, logged);
    }

    #[test]
    fn concurrent_toggles_alternate() {
        let logger = logger();
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let logger = logger.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    logger.toggle()
                })
            })
            .collect();
        let turned_on = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|on| *on)
            .count();

        assert_eq!(turned_on, 4);
        assert!(!logger.is_logging());
    }

    #[test]
    fn toggle_flips_state() {
        let logger = logger();
        assert!(logger.toggle());
        assert!(logger.is_logging());
        assert!(!logger.toggle());
        assert!(!logger.is_logging());
    }

    #[test]
    fn verbose_controls_console_diagnostics() {
        let logger = logger();
        assert!(logger.verbose());
        assert_eq!(
            logger.console().log(ALREADY_STOPPED),
            "[netlog] Attempt to `stop` while already stopped. Returning."
        );

        logger.set_verbose(false);
        assert!(!logger.stop());
        assert_eq!(logger.console().log(ALREADY_STOPPED), "");
    }

    #[test]
    fn retention_evicts_oldest_without_touching_ids() {
        let config = LoggerConfig {
            max_entries: 2,
            ..LoggerConfig::default()
        };
        let (logger, _) = logger_with(config);
        logger.start();
        for url in ["https://a.com", "https://b.com", "https://c.com"] {
            logger.mock_request(url).unwrap();
        }
        let ids: Vec<u64> = logger.requests().iter().map(|r| r.sequence_id()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(logger.request_count(), 3);
    }

    #[test]
    fn panicking_sinks_do_not_fail_logging() {
        struct Exploding;
        impl DisplaySink for Exploding {
            fn display_request(&self, _request: &LoggedRequest) {
                panic!("display failed");
            }
        }

        let logger = logger();
        logger.attach_display(Some(Arc::new(Exploding)));
        logger.set_after_log(|_logged: &LoggedRequest| {
            panic!("callback failed");
        });
        logger.start();

        assert!(logger.mock_request("https://a.com").is_ok());
        assert_eq!(logger.requests().len(), 1);
    }

    #[test]
    fn requests_through_an_installed_hook_are_logged() {
        let (logger, installer) = logger_with(LoggerConfig::default());
        logger.start();
        let hook = installer.registry.installed()[0].clone();

        let request = Request::get("https://a.com/x").with_header("Accept", "*/*");
        assert!(!hook.should_intercept(&request));
        logger.hook().dispatcher().flush();

        let logged = logger.requests();
        assert_eq!(logged.len(), 1);
        assert!(InterceptionHook::is_marked(logged[0].request()));
    }

    #[test]
    fn stop_detaches_from_dispatcher_and_registry() {
        let installer = Arc::new(RecordingInstaller::default());
        let dispatcher = Arc::new(Dispatcher::new("stop-test"));
        let config = LoggerConfig::default();
        let logger = NetworkLogger::with_parts(
            &config,
            config.filter_chain(None),
            installer.clone(),
            dispatcher.clone(),
        );
        logger.start();
        logger.stop();
        assert_eq!(dispatcher.subscriber_count(), 0);
        assert!(installer.registry.is_empty());
        assert_eq!(logger.hook().name(), "netlog");
    }

    #[tokio::test]
    async fn live_subscribers_receive_accepted_requests() {
        let logger = logger();
        let mut rx = logger.subscribe_logged();
        logger.start();
        logger.mock_request("https://a.com").unwrap();
        let _ = logger.mock_request("ftp://b.com");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.sequence_id(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drop_detaches_from_dispatcher_and_registry() {
        let installer = Arc::new(RecordingInstaller::default());
        let dispatcher = Arc::new(Dispatcher::new("drop-test"));
        let config = LoggerConfig::default();
        let logger = NetworkLogger::with_parts(
            &config,
            config.filter_chain(None),
            installer.clone(),
            dispatcher.clone(),
        );
        logger.start();
        assert_eq!(dispatcher.subscriber_count(), 1);

        drop(logger);
        assert_eq!(dispatcher.subscriber_count(), 0);
        assert!(installer.registry.is_empty());
    }
}
