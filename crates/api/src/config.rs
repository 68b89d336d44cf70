//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use gateway::{CircuitBreakerConfig, RetryPolicy};
use saga::SagaConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON log lines, anything else for text
/// - `DATABASE_URL`: PostgreSQL saga store; in-memory when unset
/// - `SAGA_MAX_RETRIES`: retries granted to new sagas (default: `3`)
/// - `CB_SLIDING_WINDOW_SIZE`, `CB_MINIMUM_CALLS`,
///   `CB_FAILURE_RATE_THRESHOLD`, `CB_WAIT_DURATION_MS`,
///   `CB_HALF_OPEN_CALLS`: appointment circuit breaker
/// - `GATEWAY_RETRY_ATTEMPTS`, `GATEWAY_RETRY_BACKOFF_MS`: appointment
///   lookup retries
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub database_url: Option<String>,
    pub saga: SagaConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// Unset variables take their default; set but unparsable ones are an
    /// error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cb = &defaults.circuit_breaker;

        let circuit_breaker = CircuitBreakerConfig {
            sliding_window_size: parse_or(
                &lookup,
                "CB_SLIDING_WINDOW_SIZE",
                cb.sliding_window_size,
            )?,
            minimum_number_of_calls: parse_or(
                &lookup,
                "CB_MINIMUM_CALLS",
                cb.minimum_number_of_calls,
            )?,
            failure_rate_threshold: parse_or(
                &lookup,
                "CB_FAILURE_RATE_THRESHOLD",
                cb.failure_rate_threshold,
            )?,
            wait_duration_in_open_state: Duration::from_millis(parse_or(
                &lookup,
                "CB_WAIT_DURATION_MS",
                cb.wait_duration_in_open_state.as_millis() as u64,
            )?),
            permitted_calls_in_half_open: parse_or(
                &lookup,
                "CB_HALF_OPEN_CALLS",
                cb.permitted_calls_in_half_open,
            )?,
        };

        let retry = RetryPolicy::new(
            parse_or(&lookup, "GATEWAY_RETRY_ATTEMPTS", defaults.retry.max_attempts)?,
            Duration::from_millis(parse_or(
                &lookup,
                "GATEWAY_RETRY_BACKOFF_MS",
                defaults.retry.backoff.as_millis() as u64,
            )?),
        );

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            saga: SagaConfig::default().with_max_retries(parse_or(
                &lookup,
                "SAGA_MAX_RETRIES",
                defaults.saga.max_retries,
            )?),
            circuit_breaker,
            retry,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            database_url: None,
            saga: SagaConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError { key, value }),
    }
}
