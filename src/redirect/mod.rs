//! Request redirection
//!
//! A [`Redirector`] pairs an evaluator with a replacement rule. The
//! [`RedirectTable`] consults its redirectors in order and the first whose
//! evaluator matches produces the replacement; at most one fires per request.
//! The replacement is handed back to the transport, nothing here re-issues
//! requests.

use std::fmt;
use std::sync::Arc;

use crate::filter::{filter_fn, RequestFilter};
use crate::models::rule::{retarget, RequestEdit, RequestRule};
use crate::models::Request;

pub type RedirectFn = Arc<dyn Fn(&Request) -> Request + Send + Sync>;

#[derive(Clone)]
pub struct Redirector {
    name: String,
    evaluator: RequestFilter,
    redirect: RedirectFn,
}

impl Redirector {
    pub fn new<F>(name: impl Into<String>, evaluator: RequestFilter, redirect: F) -> Self
    where
        F: Fn(&Request) -> Request + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            evaluator,
            redirect: Arc::new(redirect),
        }
    }

    /// Apply `edit` to every request matching `rule`.
    pub fn from_edit(name: impl Into<String>, rule: RequestRule, edit: RequestEdit) -> Self {
        Self::new(
            name,
            filter_fn(move |request| rule.matches(request)),
            move |request| edit.apply(request),
        )
    }

    /// Send requests matching `rule` to another origin, keeping path and
    /// query.
    pub fn to_host(
        name: impl Into<String>,
        rule: RequestRule,
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        let scheme = scheme.into();
        let host = host.into();
        Self::new(
            name,
            filter_fn(move |request| rule.matches(request)),
            move |request| retarget(request, &scheme, &host, port),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_redirectable(&self, request: &Request) -> bool {
        (self.evaluator)(request)
    }

    pub fn redirect(&self, request: &Request) -> Request {
        (self.redirect)(request)
    }
}

impl fmt::Debug for Redirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirector")
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RedirectTable {
    redirectors: Vec<Redirector>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, redirector: Redirector) -> Self {
        self.redirectors.push(redirector);
        self
    }

    pub fn push(&mut self, redirector: Redirector) {
        self.redirectors.push(redirector);
    }

    fn first_match(&self, request: &Request) -> Option<&Redirector> {
        self.redirectors
            .iter()
            .find(|redirector| redirector.is_redirectable(request))
    }

    pub fn is_redirectable(&self, request: &Request) -> bool {
        self.first_match(request).is_some()
    }

    /// Replacement for `request`, or `None` when no evaluator matches.
    pub fn redirected_request(&self, request: &Request) -> Option<Request> {
        let redirector = self.first_match(request)?;
        let replacement = redirector.redirect(request);
        tracing::debug!(
            "Redirect '{}' {} -> {}",
            redirector.name(),
            request.url,
            replacement.url
        );
        Some(replacement)
    }

    pub fn len(&self) -> usize {
        self.redirectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirectors.is_empty()
    }
}
