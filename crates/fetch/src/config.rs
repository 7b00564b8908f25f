use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::provider::default_conventions;

/// Per-request timeout when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fetch client configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound on one HTTP request, connect through body.
    pub request_timeout: Duration,
    /// Secret material keyed by provider secret name.
    pub secrets: HashMap<String, String>,
}

impl FetchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `PULSEBOARD_REQUEST_TIMEOUT_SECS` | `10`    |
    /// | `FINNHUB_API_KEY`                 | unset   |
    ///
    /// Every built-in provider's secret is read from the env var of the same
    /// name; blank values are treated as unset.
    pub fn from_env() -> Self {
        let request_timeout_secs =
            env_or("PULSEBOARD_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);

        let secrets = default_conventions()
            .into_iter()
            .filter_map(|c| {
                let value = std::env::var(&c.secret).ok()?;
                let value = value.trim().to_string();
                (!value.is_empty()).then_some((c.secret, value))
            })
            .collect();

        Self {
            request_timeout: Duration::from_secs(request_timeout_secs),
            secrets,
        }
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            secrets: HashMap::new(),
        }
    }
}

/// Read and parse `name`, falling back to `default` when it is unset or
/// does not parse.
pub fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, %default, "Unparseable env var, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.secrets.is_empty());
    }

    #[test]
    fn env_or_falls_back_when_unset() {
        assert_eq!(env_or("PULSEBOARD_TEST_UNSET_VAR_7f3a", 42u64), 42);
    }
}
