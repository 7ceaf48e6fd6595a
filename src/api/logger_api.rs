//! Shared logger API
//!
//! Free functions over one process-wide logger wired to the global hook
//! registry and dispatcher.

use anyhow::Context;
use futures::stream::{self, Stream};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tracing::level_filters::LevelFilter;

use crate::config::LoggerConfig;
use crate::display::DisplaySink;
use crate::export::{curl_description, CurlContext};
use crate::logger::{LogRejection, NetworkLogger};
use crate::models::LoggedRequest;

static SHARED_LOGGER: Lazy<RwLock<Arc<NetworkLogger>>> = Lazy::new(|| {
    let config = LoggerConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Ignoring logger environment: {}", e);
        LoggerConfig::default()
    });
    RwLock::new(NetworkLogger::new(&config))
});

/// Get the version of the netlog core library
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Install the `tracing` subscriber (call once at startup). Debug builds
/// log to stderr; release builds append to a daily file under
/// `<storage_path>/logs`. The level comes from `RUST_LOG`.
pub fn init_core(storage_path: Option<String>) -> anyhow::Result<bool> {
    let level = log_level_from(std::env::var("RUST_LOG").ok().as_deref());

    if cfg!(debug_assertions) {
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    } else {
        let log_dir = storage_path
            .map(|path| PathBuf::from(path).join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;

        let appender = tracing_appender::rolling::daily(&log_dir, "netlog_core");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        // The writer flushes for as long as the guard lives.
        std::mem::forget(guard);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(writer)
            .try_init();
    }

    tracing::info!("netlog core {} ready (log level {})", env!("CARGO_PKG_VERSION"), level);
    Ok(true)
}

/// `RUST_LOG` as a single level; anything unrecognised means info.
fn log_level_from(value: Option<&str>) -> LevelFilter {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("warning") => LevelFilter::WARN,
        Some(level) => level.parse().unwrap_or(LevelFilter::INFO),
        None => LevelFilter::INFO,
    }
}

/// The process-wide logger.
pub fn shared_logger() -> Arc<NetworkLogger> {
    match SHARED_LOGGER.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Replace the shared logger with a fresh, stopped one built from `config`.
/// The previous logger is stopped, and live traffic streams on it end.
pub fn configure_shared_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let logger = NetworkLogger::new(&config);
    let previous = {
        let mut guard = SHARED_LOGGER
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, logger)
    };
    if previous.is_logging() {
        previous.stop();
    }
    tracing::info!("Shared logger reconfigured");
    Ok(())
}

pub fn start_logging() -> bool {
    shared_logger().start()
}

pub fn stop_logging() -> bool {
    shared_logger().stop()
}

/// Returns the new logging state.
pub fn toggle_logging() -> bool {
    shared_logger().toggle()
}

pub fn is_logging() -> bool {
    shared_logger().is_logging()
}

pub fn set_verbose(verbose: bool) {
    shared_logger().set_verbose(verbose);
}

/// Logged requests, most recent first.
pub fn get_requests() -> Vec<LoggedRequest> {
    shared_logger().requests()
}

pub fn get_request_count() -> u64 {
    shared_logger().request_count()
}

pub fn clear_requests() {
    shared_logger().clear();
}

pub fn attach_display(display: Option<Arc<dyn DisplaySink>>) {
    shared_logger().attach_display(display);
}

pub fn mock_request(url: &str) -> Result<LoggedRequest, LogRejection> {
    shared_logger().mock_request(url)
}

/// curl command for a stored request, `None` if it is not in the log.
pub fn export_curl(sequence_id: u64, context: &CurlContext) -> Option<String> {
    shared_logger()
        .request(sequence_id)
        .map(|logged| curl_description(logged.request(), context))
}

/// Live stream of requests accepted by the shared logger. Receivers that
/// fall behind skip the requests they missed.
pub fn subscribe_traffic() -> impl Stream<Item = LoggedRequest> + Send + 'static {
    let rx = shared_logger().subscribe_logged();
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(logged) => return Some((logged, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Traffic stream lagged; skipped {} request(s)", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serial_test::serial;

    fn reset() {
        configure_shared_logger(LoggerConfig {
            verbose: false,
            ..LoggerConfig::default()
        })
        .expect("default config is valid");
    }

    #[test]
    #[serial]
    fn shared_logger_lifecycle() {
        reset();
        assert!(!is_logging());
        assert!(start_logging());
        assert!(!start_logging());

        mock_request("https://a.com/one").unwrap();
        assert_eq!(
            mock_request("ftp://a.com").unwrap_err(),
            LogRejection::FilteredOut
        );
        assert_eq!(get_request_count(), 1);
        assert_eq!(get_requests()[0].url(), "https://a.com/one");

        clear_requests();
        assert!(get_requests().is_empty());
        assert_eq!(get_request_count(), 1);

        assert!(!toggle_logging());
        assert_eq!(
            mock_request("https://a.com").unwrap_err(),
            LogRejection::NotLogging
        );
    }

    #[test]
    #[serial]
    fn export_curl_looks_up_by_sequence_id() {
        reset();
        start_logging();
        let logged = mock_request("https://a.com/x").unwrap();

        let curl = export_curl(logged.sequence_id(), &CurlContext::default()).unwrap();
        assert!(curl.starts_with("curl -v"));
        assert!(export_curl(99, &CurlContext::default()).is_none());
        stop_logging();
    }

    #[test]
    #[serial]
    fn reconfiguring_rejects_invalid_config() {
        let err = configure_shared_logger(LoggerConfig {
            broadcast_capacity: 0,
            ..LoggerConfig::default()
        });
        assert!(err.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn traffic_stream_yields_logged_requests() {
        reset();
        let mut traffic = Box::pin(subscribe_traffic());
        start_logging();
        mock_request("https://a.com/1").unwrap();
        mock_request("https://a.com/2").unwrap();

        let first = traffic.next().await.unwrap();
        let second = traffic.next().await.unwrap();
        assert_eq!(first.sequence_id(), 1);
        assert_eq!(second.url(), "https://a.com/2");
        stop_logging();

        reset();
        assert!(traffic.next().await.is_none());
    }

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(log_level_from(None), LevelFilter::INFO);
        assert_eq!(log_level_from(Some("Debug")), LevelFilter::DEBUG);
        assert_eq!(log_level_from(Some("warning")), LevelFilter::WARN);
        assert_eq!(log_level_from(Some("netlog=trace")), LevelFilter::INFO);
    }

    #[test]
    fn version_matches_package() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }
}
