//! Multi-widget data binding engine.
//!
//! [`BindingEngine`] keeps one live binding per widget. Each enabled
//! binding runs a polling task (fetch immediately, then every
//! `refreshInterval`) under its own cancellation token, a child of the
//! engine's master token. Snapshots are published per binding through a
//! [`tokio::sync::watch`] channel; lifecycle events go out on a
//! [`tokio::sync::broadcast`] channel, see [`BindingEngine::events`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pulseboard_core::extract::{classify, render, Rendered, ResponseShape};
use pulseboard_core::types::{Timestamp, WidgetId};
use pulseboard_core::{Widget, WidgetType};
use pulseboard_fetch::{FetchErrorKind, Fetcher};
use pulseboard_store::WidgetStore;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::binding::{run_poll_loop, BindingState};
use crate::config::EngineConfig;
use crate::events::EngineEvent;
use crate::snapshot::{FetchPhase, FetchSnapshot};

/// Broadcast channel capacity for engine events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors returned by [`BindingEngine`] queries and commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("No binding for widget '{0}'")]
    UnknownWidget(WidgetId),
}

// ---------------------------------------------------------------------------
// Presentation query
// ---------------------------------------------------------------------------

/// Everything a presentation layer needs to draw one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub widget_id: WidgetId,
    pub title: String,
    pub widget_type: WidgetType,
    pub phase: FetchPhase,
    pub is_loading: bool,
    pub error: Option<String>,
    pub error_kind: Option<FetchErrorKind>,
    pub last_updated_at: Option<Timestamp>,
    /// `None` until the first successful fetch.
    pub rendered: Option<Rendered>,
}

// ---------------------------------------------------------------------------
// BindingEngine
// ---------------------------------------------------------------------------

/// Keeps every widget's snapshot fresh on its own cadence.
///
/// Created once at startup via [`BindingEngine::new`]; the returned `Arc`
/// can be cloned into any consumer.
pub struct BindingEngine {
    bindings: RwLock<HashMap<WidgetId, ManagedBinding>>,
    fetcher: Arc<dyn Fetcher>,
    config: EngineConfig,
    event_tx: broadcast::Sender<EngineEvent>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

/// Internal bookkeeping for one binding.
struct ManagedBinding {
    state: Arc<BindingState>,
    /// `None` for disabled widgets, which never poll.
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl BindingEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: EngineConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            fetcher,
            config,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to binding lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub async fn binding_count(&self) -> usize {
        self.bindings.read().await.len()
    }

    /// Reconcile bindings with `widgets`.
    ///
    /// - new widgets get a binding (and a polling task if enabled);
    /// - widgets whose endpoint, params, or interval changed are restarted
    ///   with an empty snapshot;
    /// - other edits are applied in place, keeping the snapshot;
    /// - bindings for widgets no longer present are torn down.
    pub async fn sync(&self, widgets: &[Widget]) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut bindings = self.bindings.write().await;

        let wanted: HashSet<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        let stale: Vec<WidgetId> = bindings
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(managed) = bindings.remove(&id) {
                self.teardown(managed);
            }
        }

        for widget in widgets {
            match bindings.get(&widget.id) {
                Some(managed) if managed.state.widget().shares_binding_with(widget) => {
                    managed.state.update_widget(widget.clone());
                }
                Some(_) => {
                    tracing::info!(widget_id = %widget.id, "Widget source changed, restarting binding");
                    if let Some(old) = bindings.remove(&widget.id) {
                        self.teardown(old);
                    }
                    bindings.insert(widget.id.clone(), self.start(widget.clone()));
                }
                None => {
                    bindings.insert(widget.id.clone(), self.start(widget.clone()));
                }
            }
        }
    }

    /// Apply every change published by `store` until `cancel` fires or the
    /// store goes away.
    pub async fn follow(&self, store: &WidgetStore, cancel: CancellationToken) {
        let mut rx = store.subscribe();
        self.sync(&store.widgets()).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => {
                        tracing::debug!(kind = ?event.kind, "Store changed, syncing bindings");
                        self.sync(&event.widgets).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Store events lagged, resyncing from current state");
                        self.sync(&store.widgets()).await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::debug!("Stopped following widget store");
    }

    /// Latest snapshot for `widget_id`.
    pub async fn snapshot(&self, widget_id: &str) -> Option<FetchSnapshot> {
        let bindings = self.bindings.read().await;
        bindings.get(widget_id).map(|m| m.state.snapshot())
    }

    /// Watch `widget_id`'s snapshot. The receiver sees the channel close when
    /// the binding is torn down.
    pub async fn subscribe(&self, widget_id: &str) -> Option<watch::Receiver<FetchSnapshot>> {
        let bindings = self.bindings.read().await;
        bindings.get(widget_id).map(|m| m.state.subscribe())
    }

    /// Fetch `widget_id` now, joining any fetch already in flight, and
    /// return the resulting snapshot. Disabled widgets return their idle
    /// snapshot without fetching.
    pub async fn refresh(&self, widget_id: &str) -> Result<FetchSnapshot, EngineError> {
        let (state, enabled) = {
            let bindings = self.bindings.read().await;
            let managed = bindings
                .get(widget_id)
                .ok_or_else(|| EngineError::UnknownWidget(widget_id.to_string()))?;
            (Arc::clone(&managed.state), managed.task_handle.is_some())
        };

        if enabled {
            tracing::debug!(widget_id, "Manual refresh");
            state.refresh().await;
        }
        Ok(state.snapshot())
    }

    /// Presentation query: snapshot plus the widget's data shaped for its
    /// type.
    pub async fn view(&self, widget_id: &str) -> Option<WidgetView> {
        let state = {
            let bindings = self.bindings.read().await;
            Arc::clone(&bindings.get(widget_id)?.state)
        };
        let widget = state.widget();
        let snapshot = state.snapshot();

        let rendered = snapshot.data.as_deref().map(|data| {
            if widget.widget_type == WidgetType::Chart
                && matches!(classify(data, None), ResponseShape::Reading(_))
            {
                Rendered::Chart(state.history())
            } else {
                render(&widget, data)
            }
        });

        Some(WidgetView {
            widget_id: widget.id,
            title: widget.display_config.title,
            widget_type: widget.widget_type,
            phase: snapshot.phase(),
            is_loading: snapshot.is_loading,
            error: snapshot.error.as_ref().map(ToString::to_string),
            error_kind: snapshot.error_kind(),
            last_updated_at: snapshot.last_updated_at,
            rendered,
        })
    }

    /// Cancel every binding and wait for the polling tasks to exit.
    ///
    /// Waits up to [`EngineConfig::shutdown_timeout`] per task.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down binding engine");
        self.cancel.cancel();

        let mut bindings = self.bindings.write().await;
        for (id, managed) in bindings.drain() {
            tracing::debug!(widget_id = %id, "Stopping binding");
            managed.state.stop();
            if let Some(handle) = managed.task_handle {
                let _ = tokio::time::timeout(self.config.shutdown_timeout, handle).await;
            }
        }

        tracing::info!("Binding engine shut down complete");
    }

    // ---- private helpers ----

    fn start(&self, widget: Widget) -> ManagedBinding {
        let interval = widget.refresh_interval();
        let enabled = widget.is_enabled();
        let state = Arc::new(BindingState::new(
            widget,
            Arc::clone(&self.fetcher),
            self.config.retry,
            self.config.history_capacity,
            self.cancel.child_token(),
            self.event_tx.clone(),
        ));

        let endpoint = state.endpoint_for_log();
        let task_handle = enabled.then(|| {
            let task_state = Arc::clone(&state);
            tokio::spawn(run_poll_loop(task_state, interval))
        });

        tracing::info!(
            widget_id = %state.widget_id,
            endpoint = %endpoint,
            interval_secs = interval.as_secs(),
            enabled,
            "Binding started",
        );
        let _ = self.event_tx.send(EngineEvent::BindingStarted {
            widget_id: state.widget_id.clone(),
            endpoint,
        });

        ManagedBinding { state, task_handle }
    }

    fn teardown(&self, managed: ManagedBinding) {
        managed.state.stop();
        if let Some(handle) = managed.task_handle {
            handle.abort();
        }
        tracing::info!(widget_id = %managed.state.widget_id, "Binding removed");
        let _ = self.event_tx.send(EngineEvent::BindingRemoved {
            widget_id: managed.state.widget_id.clone(),
        });
    }
}
