//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::BrokerConfig;
use event_bus::RetryPolicy;

/// Log output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `BUS_MAX_RETRIES`: handler retries before dead-lettering (default: `3`)
/// - `BUS_RETRY_MIN_DELAY_MS` / `BUS_RETRY_MAX_DELAY_MS`: handler backoff
///   bounds (default: `10` / `1000`)
/// - `STORE_TIMEOUT_MS`: deadline per event store call (default: `5000`)
/// - `STORE_MAX_RETRIES`: retries of transient store failures (default: `3`)
/// - `BUS_DELIVERY_LOG_CAPACITY`: deliveries remembered for de-duplication
///   (default: `10000`)
/// - `OUTBOX_RELAY_INTERVAL_MS`: how often unpublished integration events are
///   retried (default: `1000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub bus_max_retries: usize,
    pub bus_retry_min_delay: Duration,
    pub bus_retry_max_delay: Duration,
    pub store_timeout: Duration,
    pub store_max_retries: usize,
    pub bus_delivery_log_capacity: usize,
    pub outbox_relay_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: env_parse("LOG_FORMAT").unwrap_or(defaults.log_format),
            bus_max_retries: env_parse("BUS_MAX_RETRIES").unwrap_or(defaults.bus_max_retries),
            bus_retry_min_delay: env_millis("BUS_RETRY_MIN_DELAY_MS")
                .unwrap_or(defaults.bus_retry_min_delay),
            bus_retry_max_delay: env_millis("BUS_RETRY_MAX_DELAY_MS")
                .unwrap_or(defaults.bus_retry_max_delay),
            store_timeout: env_millis("STORE_TIMEOUT_MS").unwrap_or(defaults.store_timeout),
            store_max_retries: env_parse("STORE_MAX_RETRIES")
                .unwrap_or(defaults.store_max_retries),
            bus_delivery_log_capacity: env_parse("BUS_DELIVERY_LOG_CAPACITY")
                .unwrap_or(defaults.bus_delivery_log_capacity),
            outbox_relay_interval: env_millis("OUTBOX_RELAY_INTERVAL_MS")
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.outbox_relay_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bus_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.bus_max_retries,
            min_delay: self.bus_retry_min_delay,
            max_delay: self.bus_retry_max_delay.max(self.bus_retry_min_delay),
        }
    }

    pub fn broker(&self) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            store_timeout: self.store_timeout,
            store_retry: RetryPolicy {
                max_retries: self.store_max_retries,
                ..defaults.store_retry
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            bus_max_retries: 3,
            bus_retry_min_delay: Duration::from_millis(10),
            bus_retry_max_delay: Duration::from_millis(1000),
            store_timeout: Duration::from_millis(5000),
            store_max_retries: 3,
            bus_delivery_log_capacity: event_bus::DEFAULT_DELIVERY_LOG_CAPACITY,
            outbox_relay_interval: Duration::from_millis(1000),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.bus_max_retries, 3);
        assert_eq!(config.bus_delivery_log_capacity, 10_000);
        assert_eq!(config.outbox_relay_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_retry_policies_follow_config() {
        let config = Config {
            bus_max_retries: 7,
            bus_retry_min_delay: Duration::from_millis(50),
            bus_retry_max_delay: Duration::from_millis(20),
            store_timeout: Duration::from_millis(250),
            store_max_retries: 1,
            ..Config::default()
        };

        let bus = config.bus_retry();
        assert_eq!(bus.max_retries, 7);
        assert_eq!(bus.max_delay, Duration::from_millis(50));

        let broker = config.broker();
        assert_eq!(broker.store_timeout, Duration::from_millis(250));
        assert_eq!(broker.store_retry.max_retries, 1);
    }
}
