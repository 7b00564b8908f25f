//! HTTP fetch layer for widget endpoints.
//!
//! Provides the [`Fetcher`] seam used by the binding engine, a reqwest
//! implementation with provider token injection, error classification,
//! response normalisation, and the retry policy.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod retry;

pub use client::{normalize, request_url, FetchClient, Fetcher};
pub use config::{env_or, FetchConfig};
pub use error::{FetchError, FetchErrorKind};
pub use provider::{redact, ProviderConvention};
pub use retry::{fetch_with_retry, probe, RetryPolicy, DEFAULT_RETRY_DELAY_MS};
