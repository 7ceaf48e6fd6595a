//! # netlog core
//!
//! In-process network request logging for applications: observe every
//! request an app's HTTP transports issue, filter it, number it, keep it,
//! and hand it to displays and tools.
//!
//! ## Features
//!
//! - Interception hook installed into transport handler chains
//! - Fan-out dispatcher with per-subscriber ordering and panic isolation
//! - Filter chains and request redirection rules
//! - Console and list displays, live traffic stream
//! - Export to cURL
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────┐   ┌───────────────┐
//! │  Transport   │──▶│ Interception │──▶│ Dispatcher │──▶│ NetworkLogger │
//! │ handler chain│   │     Hook     │   │            │   │ filter + log  │
//! └──────────────┘   └──────────────┘   └────────────┘   └───────┬───────┘
//!                                                                │
//!                                   ┌────────────────────────────┤
//!                                   ▼                            ▼
//!                           ┌───────────────┐           ┌────────────────┐
//!                           │ Display sinks │           │ traffic stream │
//!                           └───────────────┘           └────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod display;
pub mod export;
pub mod filter;
pub mod intercept;
pub mod logger;
pub mod models;
pub mod redirect;

pub use config::LoggerConfig;
pub use logger::{LogRejection, NetworkLogger};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
