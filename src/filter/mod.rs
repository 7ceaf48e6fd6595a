//! Request filters
//!
//! A filter is a pure predicate over a [`Request`]. The logger core keeps an
//! ordered [`FilterChain`]; a request is recorded only when every filter in
//! the chain accepts it. Evaluation stops at the first rejection.

use std::fmt;
use std::sync::Arc;

use crate::models::rule::RequestRule;
use crate::models::Request;

/// Shared predicate deciding whether a request is recorded.
pub type RequestFilter = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Wrap a closure as a [`RequestFilter`].
pub fn filter_fn<F>(f: F) -> RequestFilter
where
    F: Fn(&Request) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Accepts every request.
pub fn allow_all_filter() -> RequestFilter {
    filter_fn(|_| true)
}

/// Accepts only `http` and `https` requests (any case). Requests without a
/// scheme are rejected.
pub fn http_only_filter() -> RequestFilter {
    filter_fn(|request| {
        request
            .scheme()
            .map(|scheme| {
                scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
            })
            .unwrap_or(false)
    })
}

/// Rejects requests matching `rule`.
pub fn exclude_rule_filter(rule: RequestRule) -> RequestFilter {
    filter_fn(move |request| !rule.matches(request))
}

/// Ordered conjunction of filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<RequestFilter>,
}

impl FilterChain {
    /// An empty chain, which allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: http/https only, then `custom` (allow-all when
    /// absent).
    pub fn default_with(custom: Option<RequestFilter>) -> Self {
        Self::new()
            .with(http_only_filter())
            .with(custom.unwrap_or_else(allow_all_filter))
    }

    pub fn with(mut self, filter: RequestFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: RequestFilter) {
        self.filters.push(filter);
    }

    /// Append one exclusion filter per host substring.
    pub fn excluding_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for host in hosts {
            self.filters.push(exclude_rule_filter(RequestRule::host(host)));
        }
        self
    }

    pub fn allows(&self, request: &Request) -> bool {
        self.filters.iter().all(|filter| filter(request))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}
