//! Automatic retry around a [`Fetcher`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::client::{request_url, Fetcher};
use crate::error::FetchError;
use crate::provider::redact;

/// Delay before the single retry when none is configured.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// How many extra attempts a failed fetch gets, and how long to wait first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, never retried.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Fetch `url`, retrying retryable failures per `policy`.
///
/// The last error is returned once retries are exhausted.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Value, FetchError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match fetcher.fetch(url).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                tracing::warn!(
                    url = %redact(url),
                    attempt,
                    error = %e,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Fetch failed, retrying",
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One-off fetch used to preview an endpoint before a widget is committed.
///
/// Applies `params` the same way a live binding does.
pub async fn probe(
    fetcher: &dyn Fetcher,
    endpoint: &str,
    params: Option<&BTreeMap<String, String>>,
    policy: &RetryPolicy,
) -> Result<Value, FetchError> {
    let url = request_url(endpoint, params)?;
    tracing::debug!(url = %redact(&url), "Probing endpoint");
    fetch_with_retry(fetcher, &url, policy).await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Replays scripted outcomes and records every URL it was asked for.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<Value, FetchError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Value, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Network("script exhausted".into())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_then_succeeds() {
        let fetcher = Scripted::new(vec![Err(FetchError::RateLimited), Ok(json!({"ok": true}))]);
        let value = fetch_with_retry(&fetcher, "http://x", &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_surfaces() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Http { status: 500 }),
            Err(FetchError::Http { status: 503 }),
            Ok(json!(1)),
        ]);
        let result = fetch_with_retry(&fetcher, "http://x", &RetryPolicy::default()).await;
        assert_matches!(result, Err(FetchError::Http { status: 503 }));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_error_is_not_retried() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Configuration {
                provider: "finnhub".into(),
                secret: "FINNHUB_API_KEY".into(),
            }),
            Ok(json!(1)),
        ]);
        let result = fetch_with_retry(&fetcher, "http://x", &RetryPolicy::default()).await;
        assert_matches!(result, Err(FetchError::Configuration { .. }));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let fetcher = Scripted::new(vec![Err(FetchError::RateLimited)]);
        let result = fetch_with_retry(&fetcher, "http://x", &RetryPolicy::none()).await;
        assert_matches!(result, Err(FetchError::RateLimited));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn probe_applies_params() {
        let fetcher = Scripted::new(vec![Ok(json!([]))]);
        let params = BTreeMap::from([("symbol".to_string(), "AAPL".to_string())]);
        probe(
            &fetcher,
            "https://example.com/quote",
            Some(&params),
            &RetryPolicy::none(),
        )
        .await
        .unwrap();
        assert_eq!(
            fetcher.calls.lock().unwrap()[0],
            "https://example.com/quote?symbol=AAPL"
        );
    }

    #[tokio::test]
    async fn probe_rejects_blank_endpoint() {
        let fetcher = Scripted::new(vec![]);
        let result = probe(&fetcher, "  ", None, &RetryPolicy::default()).await;
        assert_matches!(result, Err(FetchError::InvalidEndpoint(_)));
        assert_eq!(fetcher.calls(), 0);
    }
}
