//! Transport handler chain
//!
//! A [`Transport`] stands in for an HTTP client's request pipeline. It
//! performs no I/O: `submit` resolves which handler owns a request and what
//! request is finally issued, and hands that back to the caller.

use std::fmt;
use std::sync::Arc;

use crate::intercept::HookRegistry;
use crate::models::Request;

/// A link in a transport's handler chain.
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this handler takes ownership of `request`.
    fn should_intercept(&self, request: &Request) -> bool;

    /// Canonical form of a request this handler owns.
    fn canonicalize(&self, request: Request) -> Request {
        request
    }

    /// What later handlers in the chain see after this one declined
    /// `request`.
    fn passed_on(&self, request: Request) -> Request {
        request
    }

    /// Replacement to issue instead of `request`, if any.
    fn redirected_request(&self, _request: &Request) -> Option<Request> {
        None
    }
}

/// Outcome of submitting a request to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The request that is actually issued.
    pub request: Request,
    /// Name of the handler that took ownership; `None` for the default
    /// route.
    pub handled_by: Option<String>,
    pub redirected: bool,
}

pub struct Transport {
    name: String,
    registry: Option<Arc<HookRegistry>>,
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl Transport {
    /// A transport that honours hooks installed in the global registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, HookRegistry::global())
    }

    pub fn with_registry(name: impl Into<String>, registry: Arc<HookRegistry>) -> Self {
        Self {
            name: name.into(),
            registry: Some(registry),
            handlers: Vec::new(),
        }
    }

    /// A transport that has not opted into interception.
    pub fn isolated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: None,
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a handler to this transport's own chain.
    pub fn register_handler(&mut self, handler: Arc<dyn RequestHandler>) {
        self.handlers.push(handler);
    }

    /// Effective chain: installed hooks first, then own handlers that are
    /// not already among them.
    pub fn handler_chain(&self) -> Vec<Arc<dyn RequestHandler>> {
        let mut chain: Vec<Arc<dyn RequestHandler>> = self
            .registry
            .as_ref()
            .map(|registry| {
                registry
                    .installed()
                    .into_iter()
                    .map(|hook| hook as Arc<dyn RequestHandler>)
                    .collect()
            })
            .unwrap_or_default();
        for handler in &self.handlers {
            if !chain.iter().any(|existing| same_handler(existing, handler)) {
                chain.push(Arc::clone(handler));
            }
        }
        chain
    }

    /// Run `request` through the chain. The first redirect offered by any
    /// handler replaces the request; the replacement is what later handlers
    /// observe and what is returned.
    pub fn submit(&self, request: Request) -> Submission {
        let chain = self.handler_chain();

        let (request, redirected) = match chain
            .iter()
            .find_map(|handler| handler.redirected_request(&request))
        {
            Some(replacement) => (replacement, true),
            None => (request, false),
        };

        // Later handlers see what earlier ones passed on, so a request a hook
        // has already published arrives marked at every hook after it.
        let mut observed = request.clone();
        for handler in &chain {
            if handler.should_intercept(&observed) {
                tracing::debug!(
                    "Transport '{}': {} {} handled by '{}'",
                    self.name,
                    request.method,
                    request.url,
                    handler.name()
                );
                return Submission {
                    request: handler.canonicalize(request),
                    handled_by: Some(handler.name().to_string()),
                    redirected,
                };
            }
            observed = handler.passed_on(observed);
        }

        Submission {
            request,
            handled_by: None,
            redirected,
        }
    }
}

fn same_handler(a: &Arc<dyn RequestHandler>, b: &Arc<dyn RequestHandler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .field("uses_registry", &self.registry.is_some())
            .finish()
    }
}
