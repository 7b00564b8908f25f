use std::time::Duration;

use pulseboard_core::extract::DEFAULT_HISTORY_CAPACITY;
use pulseboard_fetch::{env_or, RetryPolicy, DEFAULT_RETRY_DELAY_MS};

/// How long [`shutdown`](crate::BindingEngine::shutdown) waits for each
/// polling task to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Binding engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Points kept per chart binding for single-reading endpoints.
    pub history_capacity: usize,
    /// Applied to every scheduled and manual fetch. This is the only retry
    /// setting; the fetch client itself makes a single attempt per call.
    pub retry: RetryPolicy,
    pub shutdown_timeout: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `PULSEBOARD_HISTORY_CAPACITY` | `30`    |
    /// | `PULSEBOARD_RETRY_DELAY_MS`   | `1000`  |
    pub fn from_env() -> Self {
        let history_capacity = env_or("PULSEBOARD_HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY);
        let retry_delay_ms = env_or("PULSEBOARD_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS);
        Self {
            history_capacity,
            retry: RetryPolicy {
                delay: Duration::from_millis(retry_delay_ms),
                ..RetryPolicy::default()
            },
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            retry: RetryPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}
