use pulseboard_core::types::{Timestamp, WidgetId};
use pulseboard_fetch::FetchErrorKind;
use serde::Serialize;

/// Lifecycle notifications broadcast by the binding engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A binding was created; `endpoint` has secrets redacted.
    BindingStarted { widget_id: WidgetId, endpoint: String },

    /// A fetch succeeded and the snapshot now holds fresh data.
    SnapshotUpdated { widget_id: WidgetId, at: Timestamp },

    /// A fetch failed after retries; the snapshot keeps its previous data.
    FetchFailed {
        widget_id: WidgetId,
        kind: FetchErrorKind,
        message: String,
    },

    /// The binding was torn down. Terminal for this widget id and endpoint.
    BindingRemoved { widget_id: WidgetId },
}

impl EngineEvent {
    pub fn widget_id(&self) -> &str {
        match self {
            Self::BindingStarted { widget_id, .. }
            | Self::SnapshotUpdated { widget_id, .. }
            | Self::FetchFailed { widget_id, .. }
            | Self::BindingRemoved { widget_id } => widget_id,
        }
    }
}
