//! Models related to request matching and request editing.

use crate::models::{HttpMethod, Request, UrlParts};
use serde::{Deserialize, Serialize};

/// Declarative request matcher.
///
/// All configured criteria must hold. Substring checks ignore ASCII case.
/// A disabled rule never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRule {
    pub enabled: bool,
    pub method: Option<HttpMethod>,
    pub host_contains: Option<String>,
    pub path_contains: Option<String>,
}

impl Default for RequestRule {
    fn default() -> Self {
        Self {
            enabled: true,
            method: None,
            host_contains: None,
            path_contains: None,
        }
    }
}

impl RequestRule {
    pub fn host(host_contains: impl Into<String>) -> Self {
        Self {
            host_contains: Some(host_contains.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(method) = self.method {
            if method != request.method {
                return false;
            }
        }
        let parts = request.url_parts();
        if let Some(host) = &self.host_contains {
            if !parts
                .host
                .to_ascii_lowercase()
                .contains(&host.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(path) = &self.path_contains {
            if !parts
                .path_and_query
                .to_ascii_lowercase()
                .contains(&path.to_ascii_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Overrides applied to a request to produce its replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEdit {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    /// Headers set (case-insensitively replaced) on the request.
    pub headers: Option<Vec<(String, String)>>,
    pub body: Option<Vec<u8>>,
}

impl RequestEdit {
    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.url.is_none() && self.headers.is_none() && self.body.is_none()
    }

    /// Return a copy of `request` with the overrides applied. Properties are
    /// carried over.
    pub fn apply(&self, request: &Request) -> Request {
        let mut edited = request.clone();
        if let Some(method) = self.method {
            edited.method = method;
        }
        if let Some(url) = &self.url {
            edited.url = url.clone();
        }
        if let Some(headers) = &self.headers {
            for (name, value) in headers {
                edited.headers.update(name.clone(), value.clone());
            }
        }
        if let Some(body) = &self.body {
            edited.body = Some(body.clone().into());
            edited
                .headers
                .update("Content-Length", body.len().to_string());
        }
        edited
    }
}

/// Rewrite the scheme/host/port of `request`, keeping path and query.
pub fn retarget(request: &Request, scheme: &str, host: &str, port: Option<u16>) -> Request {
    let parts = request.url_parts();
    let target = UrlParts {
        scheme: Some(scheme.to_string()),
        host: host.to_string(),
        port,
        path_and_query: parts.path_and_query,
    };
    let mut retargeted = request.clone();
    retargeted.url = target.to_url();
    if retargeted.headers.contains("Host") {
        retargeted.headers.update("Host", host);
    }
    retargeted
}
