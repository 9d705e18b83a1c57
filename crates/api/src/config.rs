//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use event_bus::RetryPolicy;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `DATABASE_URL`: PostgreSQL event store; unset means in-memory
/// - `CATALOG_FILE`: JSON array of catalog items to seed the inventory
/// - `EVENT_RETRY_MAX`: retries per event after the first attempt (default `3`)
/// - `EVENT_RETRY_BASE_DELAY_MS`: first backoff delay (default `100`)
/// - `EVENT_BUS_CAPACITY`: buffered messages per subscriber (default `1024`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub catalog_file: Option<PathBuf>,
    pub event_retry_max: u32,
    pub event_retry_base_delay: Duration,
    pub event_bus_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        fn parse_with<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_with(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_with(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            catalog_file: non_empty("CATALOG_FILE").map(PathBuf::from),
            event_retry_max: parse_with(&lookup, "EVENT_RETRY_MAX").unwrap_or(defaults.event_retry_max),
            event_retry_base_delay: parse_with(&lookup, "EVENT_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.event_retry_base_delay),
            event_bus_capacity: parse_with(&lookup, "EVENT_BUS_CAPACITY").unwrap_or(defaults.event_bus_capacity),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.event_retry_max, self.event_retry_base_delay)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            catalog_file: None,
            event_retry_max: 3,
            event_retry_base_delay: Duration::from_millis(100),
            event_bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.catalog_file.is_none());
        assert_eq!(config.event_retry_max, 3);
        assert_eq!(config.event_retry_base_delay, Duration::from_millis(100));
        assert_eq!(config.event_bus_capacity, 1024);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("CATALOG_FILE", "/etc/catalog.json"),
            ("EVENT_RETRY_MAX", "5"),
            ("EVENT_RETRY_BASE_DELAY_MS", "250"),
            ("EVENT_BUS_CAPACITY", "64"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.catalog_file, Some(PathBuf::from("/etc/catalog.json")));
        assert_eq!(config.retry_policy().max_retries, 5);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(250));
        assert_eq!(config.event_bus_capacity, 64);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("LOG_FORMAT", "xml"), ("DATABASE_URL", " ")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
    }
}
