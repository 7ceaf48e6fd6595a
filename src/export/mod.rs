//! Export of logged requests to external formats.

pub mod curl;

pub use curl::{curl_description, Credential, CurlContext, CURL_UNAVAILABLE};
