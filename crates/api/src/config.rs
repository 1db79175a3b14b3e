//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::RetryPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON log lines, anything else for text
/// - `DATABASE_URL` — PostgreSQL ledger; the in-memory ledger is used when unset
/// - `REQUEST_TIMEOUT_MS` — deadline for each request's sagas (default: `5000`)
/// - `ONBOARDING_REFRESH_URL` / `ONBOARDING_RETURN_URL` — base URLs handed to
///   the payment processor's onboarding links
/// - `CONNECT_MAX_ATTEMPTS`, `CONNECT_ATTEMPT_TIMEOUT_MS`,
///   `CONNECT_SLEEP_INTERVAL_MS` — startup connector policy (default: 5, 10, 10)
/// - `COMPENSATION_MAX_ATTEMPTS` — tries per compensating action (default: `1`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub database_url: Option<String>,
    pub request_timeout: Duration,
    pub onboarding_refresh_url: String,
    pub onboarding_return_url: String,
    pub connect_max_attempts: u32,
    pub connect_attempt_timeout: Duration,
    pub connect_sleep_interval: Duration,
    pub compensation_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key).map(Duration::from_millis).unwrap_or(default)
        };
        let count = |key: &str, default: u32| {
            parsed(key)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            request_timeout: millis("REQUEST_TIMEOUT_MS", defaults.request_timeout),
            onboarding_refresh_url: lookup("ONBOARDING_REFRESH_URL")
                .unwrap_or(defaults.onboarding_refresh_url),
            onboarding_return_url: lookup("ONBOARDING_RETURN_URL")
                .unwrap_or(defaults.onboarding_return_url),
            connect_max_attempts: count("CONNECT_MAX_ATTEMPTS", defaults.connect_max_attempts),
            connect_attempt_timeout: millis(
                "CONNECT_ATTEMPT_TIMEOUT_MS",
                defaults.connect_attempt_timeout,
            ),
            connect_sleep_interval: millis(
                "CONNECT_SLEEP_INTERVAL_MS",
                defaults.connect_sleep_interval,
            ),
            compensation_max_attempts: count(
                "COMPENSATION_MAX_ATTEMPTS",
                defaults.compensation_max_attempts,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Policy used to probe collaborators at startup.
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_max_attempts,
            Some(self.connect_attempt_timeout),
            self.connect_sleep_interval,
        )
    }

    /// Policy for compensating actions; `None` means a single attempt.
    pub fn compensation_policy(&self) -> Option<RetryPolicy> {
        (self.compensation_max_attempts > 1).then(|| {
            RetryPolicy::new(
                self.compensation_max_attempts,
                None,
                self.connect_sleep_interval,
            )
        })
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
            request_timeout: Duration::from_millis(5000),
            onboarding_refresh_url: "http://localhost:3000/merchants/onboarding/refresh"
                .to_string(),
            onboarding_return_url: "http://localhost:3000/merchants/onboarding/return"
                .to_string(),
            connect_max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            connect_attempt_timeout: RetryPolicy::DEFAULT_ATTEMPT_TIMEOUT,
            connect_sleep_interval: RetryPolicy::DEFAULT_SLEEP_INTERVAL,
            compensation_max_attempts: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert!(config.database_url.is_none());
        assert_eq!(config.connect_policy(), RetryPolicy::default());
        assert!(config.compensation_policy().is_none());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/merchants"),
            ("REQUEST_TIMEOUT_MS", "250"),
            ("CONNECT_MAX_ATTEMPTS", "3"),
            ("CONNECT_ATTEMPT_TIMEOUT_MS", "100"),
            ("COMPENSATION_MAX_ATTEMPTS", "4"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert!(config.log_json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/merchants")
        );
        assert_eq!(config.request_timeout, Duration::from_millis(250));

        let policy = config.connect_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.attempt_timeout, Some(Duration::from_millis(100)));

        let compensation = config.compensation_policy().unwrap();
        assert_eq!(compensation.max_attempts, 4);
        assert_eq!(compensation.attempt_timeout, None);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("CONNECT_MAX_ATTEMPTS", "-1")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.connect_max_attempts, 5);
    }

    #[test]
    fn test_blank_database_url_is_ignored() {
        assert!(from_pairs(&[("DATABASE_URL", "  ")]).database_url.is_none());
    }
}
