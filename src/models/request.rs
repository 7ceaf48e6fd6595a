//! Outbound request model
//!
//! A snapshot of a request as issued through a transport. The interception
//! layer only reads these values (and stamps properties on copies); the
//! transport that produced them stays the owner of the real request.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::HttpHeaders;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    /// Convert from string (lossy, defaults to GET)
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "CONNECT" => HttpMethod::Connect,
            "TRACE" => HttpMethod::Trace,
            _ => HttpMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(HttpMethod::from_str_lossy(s))
    }
}

/// Components of a request URL.
///
/// Parsing is lenient: a URL without `://` has no scheme and no host, and
/// the whole string is kept as the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Option<String>,
    pub host: String,
    /// Explicit port, or the scheme default for http/https.
    pub port: Option<u16>,
    pub path_and_query: String,
}

impl UrlParts {
    pub fn parse(url: &str) -> Self {
        let (scheme, remainder) = match url.find("://") {
            Some(pos) if is_scheme(&url[..pos]) => (Some(&url[..pos]), &url[pos + 3..]),
            _ => {
                return Self {
                    scheme: None,
                    host: String::new(),
                    port: None,
                    path_and_query: url.to_string(),
                }
            }
        };

        let (authority, path_and_query) = match remainder.find(['/', '?', '#']) {
            Some(pos) => (&remainder[..pos], &remainder[pos..]),
            None => (remainder, ""),
        };
        // user:password@host
        let authority = match authority.rfind('@') {
            Some(pos) => &authority[pos + 1..],
            None => authority,
        };

        let scheme = scheme.map(str::to_string);
        let (host, port) = split_host_port(authority, scheme.as_deref());
        Self {
            scheme,
            host,
            port,
            path_and_query: if path_and_query.is_empty() {
                "/".to_string()
            } else {
                path_and_query.to_string()
            },
        }
    }

    /// Rebuild a URL string, omitting the port when it is the scheme default.
    pub fn to_url(&self) -> String {
        let Some(scheme) = &self.scheme else {
            return self.path_and_query.clone();
        };
        let port_str = match self.port {
            Some(port) if Some(port) != default_port(scheme) => format!(":{}", port),
            _ => String::new(),
        };
        format!(
            "{}://{}{}{}",
            scheme, self.host, port_str, self.path_and_query
        )
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn split_host_port(authority: &str, scheme: Option<&str>) -> (String, Option<u16>) {
    let fallback = scheme.and_then(default_port);
    if authority.is_empty() {
        return (String::new(), fallback);
    }

    if authority.starts_with('[') {
        if let Some(end) = authority.find(']') {
            let host = authority[..=end].to_string();
            let remainder = &authority[end + 1..];
            if let Some(stripped) = remainder.strip_prefix(':') {
                if let Ok(port) = stripped.parse::<u16>() {
                    return (host, Some(port));
                }
            }
            return (host, fallback);
        }
    }

    if let Some(pos) = authority.rfind(':') {
        if authority[pos + 1..].chars().all(|c| c.is_ascii_digit()) {
            if let Ok(port) = authority[pos + 1..].parse::<u16>() {
                return (authority[..pos].to_string(), Some(port));
            }
        }
    }

    (authority.to_string(), fallback)
}

fn default_port(scheme: &str) -> Option<u16> {
    if scheme.eq_ignore_ascii_case("https") {
        Some(443)
    } else if scheme.eq_ignore_ascii_case("http") {
        Some(80)
    } else {
        None
    }
}

/// An outbound HTTP request as seen at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Option<Bytes>,
    /// Per-request property bag. Transports carry it along untouched; the
    /// interception hook uses it to mark requests it has already seen.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.update(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn url_parts(&self) -> UrlParts {
        UrlParts::parse(&self.url)
    }

    pub fn scheme(&self) -> Option<String> {
        self.url_parts().scheme
    }

    /// Host name, `None` when the URL has none.
    pub fn host(&self) -> Option<String> {
        Some(self.url_parts().host).filter(|h| !h.is_empty())
    }

    pub fn path(&self) -> String {
        self.url_parts().path_and_query
    }

    /// Whether any header is set. An empty list counts as no headers.
    pub fn has_headers(&self) -> bool {
        !self.headers.is_empty()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_and_path() {
        let parts = UrlParts::parse("https://api.example.com:8443/v1/items?q=1");
        assert_eq!(parts.scheme.as_deref(), Some("https"));
        assert_eq!(parts.host, "api.example.com");
        assert_eq!(parts.port, Some(8443));
        assert_eq!(parts.path_and_query, "/v1/items?q=1");
    }

    #[test]
    fn default_ports_and_root_path() {
        let parts = UrlParts::parse("http://example.com");
        assert_eq!(parts.port, Some(80));
        assert_eq!(parts.path_and_query, "/");
        assert_eq!(parts.to_url(), "http://example.com/");
    }

    #[test]
    fn url_without_scheme_has_no_host() {
        let request = Request::get("hello.world/path");
        assert_eq!(request.scheme(), None);
        assert_eq!(request.host(), None);
        assert_eq!(request.path(), "hello.world/path");
    }

    #[test]
    fn strips_user_info_and_keeps_ipv6_brackets() {
        let parts = UrlParts::parse("http://user:pw@[::1]:9090/x");
        assert_eq!(parts.host, "[::1]");
        assert_eq!(parts.port, Some(9090));
        assert_eq!(parts.to_url(), "http://[::1]:9090/x");
    }

    #[test]
    fn method_parsing_is_lossy() {
        assert_eq!("post".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!(HttpMethod::from_str_lossy("BREW"), HttpMethod::Get);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
