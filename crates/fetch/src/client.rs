//! HTTP fetch client for widget endpoints.
//!
//! Wraps [`reqwest`] with provider token injection, status classification
//! and response normalisation. One GET per call; retries live in
//! [`crate::retry`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::provider::{default_conventions, inject_token, redact, ProviderConvention};

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// Anything that can turn a URL into a JSON value.
///
/// The binding engine depends on this rather than on [`FetchClient`] so
/// tests can substitute a scripted implementation.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Perform exactly one attempt.
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

// ---------------------------------------------------------------------------
// FetchClient
// ---------------------------------------------------------------------------

/// reqwest-backed [`Fetcher`].
pub struct FetchClient {
    http: reqwest::Client,
    conventions: Vec<ProviderConvention>,
    secrets: HashMap<String, String>,
}

impl FetchClient {
    /// Client with the built-in provider conventions.
    pub fn new(config: &FetchConfig) -> Self {
        Self::with_conventions(config, default_conventions())
    }

    pub fn with_conventions(config: &FetchConfig, conventions: Vec<ProviderConvention>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            http,
            conventions,
            secrets: config.secrets.clone(),
        }
    }

    /// The exact URL a request for `url` would hit, token included.
    pub fn resolve_url(&self, url: &str) -> Result<Url, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::InvalidEndpoint("endpoint is empty".to_string()));
        }
        let url = inject_token(url, &self.conventions, &self.secrets)?;
        parse_http_url(&url)
    }

    /// Map a non-2xx status to its error, if any.
    fn classify_status(status: StatusCode) -> Result<(), FetchError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let url = self.resolve_url(url)?;
        tracing::debug!(url = %redact(url.as_str()), "Fetching");

        let response = self.http.get(url).send().await?;
        Self::classify_status(response.status())?;

        let body = response.bytes().await?;
        let value: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(normalize(value))
    }
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Append `params` to `endpoint` as query parameters, in map order.
///
/// Fails with [`FetchError::InvalidEndpoint`] when the endpoint is blank or
/// not an absolute http(s) URL.
pub fn request_url(
    endpoint: &str,
    params: Option<&BTreeMap<String, String>>,
) -> Result<String, FetchError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(FetchError::InvalidEndpoint("endpoint is empty".to_string()));
    }
    let Some(params) = params.filter(|p| !p.is_empty()) else {
        parse_http_url(endpoint)?;
        return Ok(endpoint.to_string());
    };

    let mut url = parse_http_url(endpoint)?;
    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url.to_string())
}

fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidEndpoint(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Rewrite a top-level array of primitives into `[{value: p}, ...]`.
///
/// Decided by the first element; every other shape, including an empty
/// array and an array of arrays, passes through unchanged.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) if items.first().is_some_and(is_primitive) => {
            Value::Array(items.into_iter().map(|p| json!({ "value": p })).collect())
        }
        other => other,
    }
}

fn is_primitive(value: &Value) -> bool {
    !(value.is_object() || value.is_array())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn normalize_wraps_primitive_arrays() {
        assert_eq!(
            normalize(json!([1, 2, 3])),
            json!([{"value": 1}, {"value": 2}, {"value": 3}])
        );
        assert_eq!(
            normalize(json!(["MSFT", "GOOG"])),
            json!([{"value": "MSFT"}, {"value": "GOOG"}])
        );
    }

    #[test]
    fn normalize_leaves_other_shapes() {
        for v in [json!([]), json!([{"a": 1}]), json!({"data": [1]}), json!(5)] {
            assert_eq!(normalize(v.clone()), v);
        }
    }

    #[test]
    fn normalize_leaves_nested_arrays() {
        for v in [json!([[1, 2], [3, 4]]), json!([[], ["a"]])] {
            assert_eq!(normalize(v.clone()), v);
        }
    }

    #[test]
    fn request_url_appends_params_in_order() {
        let params = BTreeMap::from([
            ("symbol".to_string(), "AAPL".to_string()),
            ("resolution".to_string(), "D".to_string()),
        ]);
        assert_eq!(
            request_url("https://finnhub.io/api/v1/stock/candle?count=5", Some(&params)).unwrap(),
            "https://finnhub.io/api/v1/stock/candle?count=5&resolution=D&symbol=AAPL"
        );
    }

    #[test]
    fn request_url_without_params_is_untouched() {
        assert_eq!(
            request_url(" https://dummyjson.com/products ", None).unwrap(),
            "https://dummyjson.com/products"
        );
        assert_eq!(
            request_url("https://dummyjson.com/products", Some(&BTreeMap::new())).unwrap(),
            "https://dummyjson.com/products"
        );
    }

    #[test]
    fn request_url_rejects_bad_endpoints() {
        assert_matches!(request_url("", None), Err(FetchError::InvalidEndpoint(_)));
        assert_matches!(request_url("not a url", None), Err(FetchError::InvalidEndpoint(_)));
        assert_matches!(
            request_url("ftp://example.com/file", None),
            Err(FetchError::InvalidEndpoint(msg)) if msg.contains("ftp")
        );
    }

    #[test]
    fn resolve_url_injects_configured_secret() {
        let config = FetchConfig::default().with_secret("FINNHUB_API_KEY", "k");
        let client = FetchClient::new(&config);
        let url = client
            .resolve_url("https://finnhub.io/api/v1/quote?symbol=AAPL")
            .unwrap();
        assert_eq!(url.query(), Some("symbol=AAPL&token=k"));
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            FetchClient::classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(FetchError::RateLimited)
        );
        assert_eq!(
            FetchClient::classify_status(StatusCode::NOT_FOUND),
            Err(FetchError::Http { status: 404 })
        );
        assert_eq!(FetchClient::classify_status(StatusCode::NO_CONTENT), Ok(()));
    }
}
