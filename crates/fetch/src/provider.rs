//! Provider conventions: third-party APIs whose URLs need an auth token
//! injected as a query parameter.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FetchError;

/// Query parameters whose values are masked before a URL is logged.
static SECRET_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:token|api_?key|access_token)=)[^&#]*").expect("valid regex")
});

/// Env var holding the Finnhub API key.
pub const FINNHUB_SECRET: &str = "FINNHUB_API_KEY";

/// One recognised provider.
#[derive(Debug, Clone)]
pub struct ProviderConvention {
    pub name: String,
    /// Matched against the full request URL.
    pub host_pattern: Regex,
    /// Query parameter carrying the token.
    pub token_param: String,
    /// Key into the secret map (and the env var it is loaded from).
    pub secret: String,
}

impl ProviderConvention {
    pub fn new(
        name: impl Into<String>,
        host_pattern: &str,
        token_param: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            host_pattern: Regex::new(host_pattern)?,
            token_param: token_param.into(),
            secret: secret.into(),
        })
    }

    /// Finnhub stock API: `token=<FINNHUB_API_KEY>`.
    pub fn finnhub() -> Self {
        static FINNHUB_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"finnhub\.io/api").expect("valid regex"));
        Self {
            name: "finnhub".to_string(),
            host_pattern: FINNHUB_RE.clone(),
            token_param: "token".to_string(),
            secret: FINNHUB_SECRET.to_string(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.host_pattern.is_match(url)
    }

    /// Append the token if `url` belongs to this provider and doesn't carry
    /// one yet. URLs of other providers pass through untouched.
    pub fn apply<'a>(
        &self,
        url: &'a str,
        secrets: &HashMap<String, String>,
    ) -> Result<Cow<'a, str>, FetchError> {
        if !self.matches(url) || url.contains(&format!("{}=", self.token_param)) {
            return Ok(Cow::Borrowed(url));
        }

        let token = secrets
            .get(&self.secret)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::Configuration {
                provider: self.name.clone(),
                secret: self.secret.clone(),
            })?;

        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(Cow::Owned(format!(
            "{url}{separator}{}={token}",
            self.token_param
        )))
    }
}

/// Built-in conventions.
pub fn default_conventions() -> Vec<ProviderConvention> {
    vec![ProviderConvention::finnhub()]
}

/// Run `url` through the first matching convention.
pub fn inject_token<'a>(
    url: &'a str,
    conventions: &[ProviderConvention],
    secrets: &HashMap<String, String>,
) -> Result<Cow<'a, str>, FetchError> {
    match conventions.iter().find(|c| c.matches(url)) {
        Some(convention) => convention.apply(url, secrets),
        None => Ok(Cow::Borrowed(url)),
    }
}

/// Mask token-like query values so the URL is safe to log.
pub fn redact(url: &str) -> Cow<'_, str> {
    SECRET_PARAM_RE.replace_all(url, "${1}***")
}
