//! Data models for Netlog
//!
//! These models are shared between the interception layer, the logger core
//! and the display sinks. They are plain values: the core observes requests,
//! it never owns the transport objects they came from.

pub mod headers;
pub mod logged;
pub mod request;
pub mod rule;

pub use headers::*;
pub use logged::*;
pub use request::*;
