//! cURL command export
//!
//! Deterministic formatter turning a request (plus session-level context)
//! into a shell-invocable `curl` command. No network side effects.

use crate::models::{HttpHeaders, Request};

pub const CURL_UNAVAILABLE: &str = "curl command could not be created";
const SEPARATOR: &str = " \\\n\t";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

/// Session-level state that shapes the exported command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurlContext {
    /// Headers the session adds to every request; request headers win.
    pub session_headers: HttpHeaders,
    pub credential: Option<Credential>,
    /// Cookies the session would send for this request.
    pub cookies: Vec<(String, String)>,
}

impl CurlContext {
    pub fn with_session_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.session_headers.update(name, value);
        self
    }

    pub fn with_credential(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }
}

pub fn curl_description(request: &Request, context: &CurlContext) -> String {
    let parts = request.url_parts();
    if parts.scheme.is_none() || parts.host.is_empty() {
        return CURL_UNAVAILABLE.to_string();
    }

    let mut components = vec!["curl -v".to_string(), format!("-X {}", request.method)];

    if let Some(credential) = &context.credential {
        components.push(format!("-u {}:{}", credential.user, credential.password));
    }

    // Cookies go out as one combined -b argument, never as a -H line.
    let mut cookies: Vec<String> = context
        .cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    if let Some(header) = request.headers.value("Cookie") {
        cookies.extend(
            header
                .split(';')
                .map(str::trim)
                .filter(|cookie| !cookie.is_empty())
                .map(str::to_string),
        );
    }
    if !cookies.is_empty() {
        components.push(format!("-b \"{}\"", cookies.join(";")));
    }

    let mut headers = HttpHeaders::new();
    for header in context.session_headers.iter().chain(request.headers.iter()) {
        if !header.name.eq_ignore_ascii_case("cookie") {
            headers.update(header.name.clone(), header.value.clone());
        }
    }
    for header in &headers {
        components.push(format!(
            "-H \"{}: {}\"",
            header.name,
            header.value.replace('"', "\\\"")
        ));
    }

    if let Some(body) = request.body.as_deref().and_then(body_argument) {
        components.push(format!("-d \"{}\"", body));
    }

    components.push(format!("\"{}\"", request.url));
    components.join(SEPARATOR)
}

fn body_argument(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if json.is_object() || json.is_array() {
            if let Ok(compact) = serde_json::to_string(&json) {
                return Some(compact.replace('"', "\\\""));
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    Some(text.replace("\\\"", "\\\\\"").replace('"', "\\\""))
}
