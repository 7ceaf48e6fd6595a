//! Logger configuration
//!
//! Defaults suit an app in development. Hosts can load a JSON file and/or
//! overlay `NETLOG_*` environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::filter::{FilterChain, RequestFilter};

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_BROADCAST_CAPACITY: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Whether lifecycle diagnostics go to the console channel
    pub verbose: bool,
    /// Maximum number of requests kept in memory (oldest evicted first)
    pub max_entries: usize,
    /// Record only http/https requests
    pub http_only: bool,
    /// Host substrings that are never recorded
    pub excluded_hosts: Vec<String>,
    /// Buffer of the live logged-request broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            http_only: true,
            excluded_hosts: Vec::new(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl LoggerConfig {
    /// Defaults overlaid with `NETLOG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading logger config {:?}", path))?;
        let config: LoggerConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing logger config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (usually the process environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("NETLOG_VERBOSE") {
            self.verbose = parse_bool("NETLOG_VERBOSE", &value)?;
        }
        if let Some(value) = lookup("NETLOG_HTTP_ONLY") {
            self.http_only = parse_bool("NETLOG_HTTP_ONLY", &value)?;
        }
        if let Some(value) = lookup("NETLOG_MAX_ENTRIES") {
            self.max_entries = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "NETLOG_MAX_ENTRIES",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("NETLOG_EXCLUDED_HOSTS") {
            self.excluded_hosts = value
                .split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .collect();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity("max_entries"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("broadcast_capacity"));
        }
        Ok(())
    }

    /// Build the filter chain this configuration describes, with `custom`
    /// evaluated last.
    pub fn filter_chain(&self, custom: Option<RequestFilter>) -> FilterChain {
        let chain = if self.http_only {
            FilterChain::default_with(custom)
        } else {
            match custom {
                Some(custom) => FilterChain::new().with(custom),
                None => FilterChain::new(),
            }
        };
        chain.excluding_hosts(self.excluded_hosts.iter().cloned())
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Request;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = LoggerConfig::default()
            .with_overrides(lookup(&[
                ("NETLOG_VERBOSE", "off"),
                ("NETLOG_MAX_ENTRIES", "25"),
                ("NETLOG_EXCLUDED_HOSTS", "metrics.io, ,ads.net"),
            ]))
            .expect("valid overrides");
        assert!(!config.verbose);
        assert!(config.http_only);
        assert_eq!(config.max_entries, 25);
        assert_eq!(config.excluded_hosts, vec!["metrics.io", "ads.net"]);
    }

    #[test]
    fn rejects_bad_values() {
        let err = LoggerConfig::default()
            .with_overrides(lookup(&[("NETLOG_VERBOSE", "maybe")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "NETLOG_VERBOSE",
                value: "maybe".into()
            }
        );
        let err = LoggerConfig::default()
            .with_overrides(lookup(&[("NETLOG_MAX_ENTRIES", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity("max_entries"));
    }

    #[test]
    fn loads_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"http_only": false, "excluded_hosts": ["tracker"]}}"#).unwrap();

        let config = LoggerConfig::load_from_path(file.path()).expect("config loads");
        assert!(!config.http_only);
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);

        let chain = config.filter_chain(None);
        assert!(chain.allows(&Request::get("ftp://files.example.com")));
        assert!(!chain.allows(&Request::get("https://tracker.example.com")));
    }

    #[test]
    fn default_chain_is_http_only() {
        let chain = LoggerConfig::default().filter_chain(None);
        assert!(chain.allows(&Request::get("https://a.com")));
        assert!(!chain.allows(&Request::get("ftp://a.com")));
    }
}
