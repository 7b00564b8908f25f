//! Per-widget fetch state as seen by consumers.

use std::sync::Arc;

use pulseboard_core::types::Timestamp;
use pulseboard_fetch::{FetchError, FetchErrorKind};
use serde::Serialize;
use serde_json::Value;

/// Latest known fetch outcome for one binding.
///
/// A failed fetch keeps the previous `data`, so a transient error degrades
/// a widget instead of blanking it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchSnapshot {
    pub data: Option<Arc<Value>>,
    pub is_loading: bool,
    pub error: Option<FetchError>,
    /// Time of the last successful fetch.
    pub last_updated_at: Option<Timestamp>,
}

/// Lifecycle position derived from a [`FetchSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// Nothing fetched yet (or fetching is disabled).
    Idle,
    Loading,
    Fresh,
    /// The most recent fetch failed.
    Stale,
}

impl FetchSnapshot {
    pub fn phase(&self) -> FetchPhase {
        if self.is_loading {
            FetchPhase::Loading
        } else if self.error.is_some() {
            FetchPhase::Stale
        } else if self.last_updated_at.is_some() {
            FetchPhase::Fresh
        } else {
            FetchPhase::Idle
        }
    }

    pub fn error_kind(&self) -> Option<FetchErrorKind> {
        self.error.as_ref().map(FetchError::kind)
    }

    pub(crate) fn loading(&mut self) {
        self.is_loading = true;
    }

    pub(crate) fn succeeded(&mut self, data: Value, at: Timestamp) {
        self.data = Some(Arc::new(data));
        self.is_loading = false;
        self.error = None;
        self.last_updated_at = Some(at);
    }

    pub(crate) fn failed(&mut self, error: FetchError) {
        self.is_loading = false;
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn phases_follow_the_fetch_lifecycle() {
        let mut snapshot = FetchSnapshot::default();
        assert_eq!(snapshot.phase(), FetchPhase::Idle);

        snapshot.loading();
        assert_eq!(snapshot.phase(), FetchPhase::Loading);

        snapshot.succeeded(json!({"c": 1}), chrono::Utc::now());
        assert_eq!(snapshot.phase(), FetchPhase::Fresh);

        snapshot.loading();
        snapshot.failed(FetchError::RateLimited);
        assert_eq!(snapshot.phase(), FetchPhase::Stale);
        assert_eq!(snapshot.error_kind(), Some(FetchErrorKind::RateLimit));
    }

    #[test]
    fn failure_keeps_previous_data() {
        let mut snapshot = FetchSnapshot::default();
        snapshot.succeeded(json!([1]), chrono::Utc::now());
        let stamped = snapshot.last_updated_at;

        snapshot.failed(FetchError::Network("reset".into()));
        assert_eq!(snapshot.data.as_deref(), Some(&json!([1])));
        assert_eq!(snapshot.last_updated_at, stamped);
    }

    #[test]
    fn success_clears_error() {
        let mut snapshot = FetchSnapshot::default();
        snapshot.failed(FetchError::Http { status: 500 });
        snapshot.succeeded(json!(1), chrono::Utc::now());
        assert!(snapshot.error.is_none());
    }
}
