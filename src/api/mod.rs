//! netlog API
//!
//! Process-wide facade over a shared [`NetworkLogger`](crate::logger::NetworkLogger)
//! for hosts that do not want to own one.

pub mod logger_api;
