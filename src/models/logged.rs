//! Logged request model
//!
//! Immutable record produced by the logger core once a request has passed
//! every filter.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{HttpHeaders, HttpMethod, Request};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedRequest {
    sequence_id: u64,
    /// Milliseconds since epoch
    logged_at: i64,
    request: Request,
}

impl LoggedRequest {
    pub(crate) fn new(sequence_id: u64, request: Request) -> Self {
        Self {
            sequence_id,
            logged_at: Utc::now().timestamp_millis(),
            request,
        }
    }

    /// 1-based position of this request in its logging session.
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn logged_at(&self) -> i64 {
        self.logged_at
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> HttpMethod {
        self.request.method
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn scheme(&self) -> Option<String> {
        self.request.scheme()
    }

    pub fn host(&self) -> Option<String> {
        self.request.host()
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.request.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.request.body.as_deref()
    }

    /// One-line summary used by list views, e.g. `#3 GET https://a.com/`.
    pub fn summary(&self) -> String {
        format!(
            "#{} {} {}",
            self.sequence_id, self.request.method, self.request.url
        )
    }
}
