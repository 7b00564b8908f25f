//! One live data binding: a widget's snapshot, its polling task, and the
//! single in-flight fetch shared by every waiter.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use pulseboard_core::extract::{classify, reading_point, SeriesHistory, SeriesPoint};
use pulseboard_core::types::WidgetId;
use pulseboard_core::{Widget, WidgetType};
use pulseboard_fetch::{fetch_with_retry, redact, request_url, FetchError, Fetcher, RetryPolicy};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::events::EngineEvent;
use crate::snapshot::FetchSnapshot;

type InFlight = Shared<BoxFuture<'static, ()>>;

/// Floor for the poll period; a zero interval would spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state of one binding. Owned by the engine and by its polling
/// task; a replaced or removed binding is cancelled and never written again.
pub(crate) struct BindingState {
    pub widget_id: WidgetId,
    /// Final request URL, or the reason the endpoint can't be fetched.
    request: Result<String, FetchError>,
    widget: RwLock<Widget>,
    snapshot: watch::Sender<FetchSnapshot>,
    history: Mutex<SeriesHistory>,
    in_flight: Mutex<Option<InFlight>>,
    cancel: CancellationToken,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl BindingState {
    pub fn new(
        widget: Widget,
        fetcher: Arc<dyn Fetcher>,
        retry: RetryPolicy,
        history_capacity: usize,
        cancel: CancellationToken,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let request = request_url(&widget.api_config.endpoint, widget.api_config.params.as_ref());
        let (snapshot, _) = watch::channel(FetchSnapshot::default());
        Self {
            widget_id: widget.id.clone(),
            request,
            widget: RwLock::new(widget),
            snapshot,
            history: Mutex::new(SeriesHistory::new(history_capacity)),
            in_flight: Mutex::new(None),
            cancel,
            fetcher,
            retry,
            event_tx,
        }
    }

    // -- read side ----------------------------------------------------------

    pub fn widget(&self) -> Widget {
        self.widget
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn history(&self) -> Vec<SeriesPoint> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .points()
    }

    /// Swap in presentation-only edits (title, mappings, type) without
    /// touching the snapshot. The rolling history is reset when the mapped
    /// fields change, since old points no longer describe the same value.
    pub fn update_widget(&self, widget: Widget) {
        let mut current = self.widget.write().unwrap_or_else(PoisonError::into_inner);
        if current.field_mappings != widget.field_mappings
            || current.widget_type != widget.widget_type
        {
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        *current = widget;
    }

    // -- fetching -----------------------------------------------------------

    /// Fetch now, or join the fetch already in flight.
    ///
    /// The fetch runs as its own task, so it completes and is applied even
    /// if every caller stops waiting. Returns once that fetch has been
    /// applied (or discarded because the binding was cancelled).
    pub async fn refresh(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let in_flight = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(shared) => {
                    tracing::trace!(widget_id = %self.widget_id, "Joining in-flight fetch");
                    shared.clone()
                }
                None => {
                    let handle = tokio::spawn(Arc::clone(self).fetch_and_apply());
                    let shared = handle.map(|_| ()).boxed().shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        in_flight.await;
    }

    async fn fetch_and_apply(self: Arc<Self>) {
        let outcome = match &self.request {
            Ok(url) => {
                self.snapshot.send_modify(FetchSnapshot::loading);
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    result = fetch_with_retry(self.fetcher.as_ref(), url, &self.retry) => Some(result),
                }
            }
            Err(e) => Some(Err(e.clone())),
        };

        match outcome {
            Some(_) if self.cancel.is_cancelled() => {
                tracing::debug!(widget_id = %self.widget_id, "Discarding response for cancelled binding");
            }
            None => {
                tracing::debug!(widget_id = %self.widget_id, "Fetch abandoned, binding cancelled");
            }
            Some(Ok(value)) => self.apply_success(value),
            Some(Err(e)) => self.apply_failure(e),
        }

        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn apply_success(&self, value: Value) {
        let at = chrono::Utc::now();
        let widget = self.widget();

        if widget.widget_type == WidgetType::Chart {
            if let Some(point) = reading_point(&value, &widget.field_mappings, at) {
                self.history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(point);
            }
        }

        tracing::debug!(
            widget_id = %self.widget_id,
            shape = classify(&value, None).name(),
            "Snapshot updated",
        );
        self.snapshot.send_modify(|s| s.succeeded(value, at));
        let _ = self.event_tx.send(EngineEvent::SnapshotUpdated {
            widget_id: self.widget_id.clone(),
            at,
        });
    }

    fn apply_failure(&self, error: FetchError) {
        tracing::warn!(
            widget_id = %self.widget_id,
            kind = error.kind().as_str(),
            error = %error,
            "Fetch failed, keeping previous data",
        );
        let event = EngineEvent::FetchFailed {
            widget_id: self.widget_id.clone(),
            kind: error.kind(),
            message: error.to_string(),
        };
        self.snapshot.send_modify(|s| s.failed(error));
        let _ = self.event_tx.send(event);
    }

    /// Cancel polling and any in-flight fetch. Late results are discarded
    /// from here on.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn endpoint_for_log(&self) -> String {
        match &self.request {
            Ok(url) => redact(url).into_owned(),
            Err(_) => redact(&self.widget().api_config.endpoint).into_owned(),
        }
    }
}

/// Poll `state` immediately, then every `interval`, until cancelled.
pub(crate) async fn run_poll_loop(state: Arc<BindingState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tracing::trace!(widget_id = %state.widget_id, "Poll tick");
        tokio::select! {
            _ = state.cancel.cancelled() => break,
            _ = state.refresh() => {}
        }
    }

    tracing::debug!(widget_id = %state.widget_id, "Poll loop exited");
}
