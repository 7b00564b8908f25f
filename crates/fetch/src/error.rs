use serde::Serialize;

/// Failure of a single fetch.
///
/// Every variant is recoverable at the widget level. The type is `Clone`
/// so one in-flight result can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The endpoint matched a provider convention whose secret is not set.
    #[error("{provider} endpoints require {secret} to be set")]
    Configuration { provider: String, secret: String },

    /// HTTP 429.
    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    /// Any other non-2xx status.
    #[error("HTTP error {status}")]
    Http { status: u16 },

    /// Transport failure: DNS, connect, TLS, timeout, truncated body.
    #[error("Network error: {0}")]
    Network(String),

    /// The body was not valid JSON.
    #[error("Response is not valid JSON: {0}")]
    Decode(String),

    /// The endpoint could not be parsed as an absolute URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Stable, payload-free classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Configuration,
    RateLimit,
    Http,
    Network,
    Decode,
    InvalidEndpoint,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::RateLimit => "rate_limit",
            Self::Http => "http",
            Self::Network => "network",
            Self::Decode => "decode",
            Self::InvalidEndpoint => "invalid_endpoint",
        }
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Configuration { .. } => FetchErrorKind::Configuration,
            Self::RateLimited => FetchErrorKind::RateLimit,
            Self::Http { .. } => FetchErrorKind::Http,
            Self::Network(_) => FetchErrorKind::Network,
            Self::Decode(_) => FetchErrorKind::Decode,
            Self::InvalidEndpoint(_) => FetchErrorKind::InvalidEndpoint,
        }
    }

    /// Whether another attempt could plausibly succeed. Misconfiguration and
    /// malformed endpoints fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration { .. } | Self::InvalidEndpoint(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.without_url().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(FetchError::RateLimited.kind(), FetchErrorKind::RateLimit);
        assert_eq!(
            FetchError::Http { status: 503 }.kind().as_str(),
            "http"
        );
    }

    #[test]
    fn configuration_and_invalid_endpoint_are_not_retryable() {
        let config = FetchError::Configuration {
            provider: "finnhub".into(),
            secret: "FINNHUB_API_KEY".into(),
        };
        assert!(!config.is_retryable());
        assert!(!FetchError::InvalidEndpoint("x".into()).is_retryable());
        assert!(FetchError::RateLimited.is_retryable());
        assert!(FetchError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn display_messages() {
        assert_eq!(FetchError::Http { status: 502 }.to_string(), "HTTP error 502");
        assert_eq!(
            FetchError::Configuration {
                provider: "finnhub".into(),
                secret: "FINNHUB_API_KEY".into()
            }
            .to_string(),
            "finnhub endpoints require FINNHUB_API_KEY to be set"
        );
    }
}
