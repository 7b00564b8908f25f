//! Ordered, persisted widget collection.
//!
//! [`WidgetStore`] owns the only mutable shared state in the system. Every
//! mutation builds a new collection, persists it, then swaps it in whole,
//! so readers always see either the old or the new collection and never a
//! mix. Subscribers are told about each committed change through a
//! broadcast channel.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use pulseboard_core::types::WidgetId;
use pulseboard_core::{validate_widget, Widget};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::backend::StorageBackend;
use crate::error::StoreError;

/// Buffer capacity of the change channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a committed mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "widget_id", rename_all = "snake_case")]
pub enum StoreEventKind {
    Added(WidgetId),
    Removed(WidgetId),
    Updated(WidgetId),
    Reordered,
}

/// A committed change, carrying the collection as it is after the change.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub kind: StoreEventKind,
    pub widgets: Arc<[Widget]>,
}

// ---------------------------------------------------------------------------
// WidgetStore
// ---------------------------------------------------------------------------

pub struct WidgetStore {
    backend: Arc<dyn StorageBackend>,
    key: String,
    widgets: RwLock<Arc<[Widget]>>,
    /// Serialises mutations, held across the storage write.
    writer: Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

impl WidgetStore {
    /// Load the collection stored under `key`.
    ///
    /// Missing, unreadable, or corrupt data yields an empty collection and
    /// a warning; it is overwritten by the next mutation.
    pub async fn open(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        let key = key.into();
        let widgets = match backend.load(&key).await {
            Ok(Some(raw)) => decode_collection(&key, &raw),
            Ok(None) => {
                tracing::info!(key = %key, "No stored widgets, starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read widget storage, starting empty");
                Vec::new()
            }
        };

        tracing::info!(key = %key, count = widgets.len(), "Widget store opened");
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            key,
            widgets: RwLock::new(widgets.into()),
            writer: Mutex::new(()),
            events,
        }
    }

    /// Snapshot of the collection in display order.
    pub fn widgets(&self) -> Arc<[Widget]> {
        self.widgets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Widget> {
        self.widgets().iter().find(|w| w.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.widgets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Receive every committed change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // -- mutations ----------------------------------------------------------

    /// Append `widget`. Its id must not already be present.
    pub async fn add(&self, widget: Widget) -> Result<(), StoreError> {
        validate_widget(&widget)?;
        let id = widget.id.clone();
        self.commit(StoreEventKind::Added(id.clone()), |current| {
            if current.iter().any(|w| w.id == id) {
                return Err(StoreError::DuplicateId(id.clone()));
            }
            let mut next = current.to_vec();
            next.push(widget);
            Ok(Some(next))
        })
        .await
    }

    /// Remove the widget with `id`. Returns `false` (and changes nothing)
    /// when no such widget exists.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.commit(StoreEventKind::Removed(id.to_string()), |current| {
            if !current.iter().any(|w| w.id == id) {
                return Ok(None);
            }
            removed = true;
            Ok(Some(current.iter().filter(|w| w.id != id).cloned().collect()))
        })
        .await?;
        Ok(removed)
    }

    /// Replace the order wholesale. `order` must name every current widget
    /// exactly once.
    pub async fn reorder(&self, order: &[WidgetId]) -> Result<(), StoreError> {
        self.commit(StoreEventKind::Reordered, |current| {
            permute(current, order).map(Some)
        })
        .await
    }

    /// Move the widget at `from` to index `to`, shifting the ones between.
    pub async fn move_widget(&self, from: usize, to: usize) -> Result<(), StoreError> {
        self.commit(StoreEventKind::Reordered, |current| {
            let len = current.len();
            for index in [from, to] {
                if index >= len {
                    return Err(StoreError::IndexOutOfBounds { index, len });
                }
            }
            if from == to {
                return Ok(None);
            }
            let mut next = current.to_vec();
            let widget = next.remove(from);
            next.insert(to, widget);
            Ok(Some(next))
        })
        .await
    }

    /// Replace the stored configuration of an existing widget in place.
    pub async fn update(&self, widget: Widget) -> Result<(), StoreError> {
        validate_widget(&widget)?;
        let id = widget.id.clone();
        self.commit(StoreEventKind::Updated(id.clone()), |current| {
            let index = current
                .iter()
                .position(|w| w.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if current[index] == widget {
                return Ok(None);
            }
            let mut next = current.to_vec();
            next[index] = widget;
            Ok(Some(next))
        })
        .await
    }

    /// Apply `mutate` to the current collection and commit the result.
    ///
    /// `mutate` returns `Ok(None)` for a no-op, which is neither persisted
    /// nor announced. The new collection is written to storage before it
    /// becomes visible; if the write fails nothing changes.
    async fn commit<F>(&self, kind: StoreEventKind, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&[Widget]) -> Result<Option<Vec<Widget>>, StoreError>,
    {
        let _guard = self.writer.lock().await;

        let current = self.widgets();
        let Some(next) = mutate(&*current)? else {
            return Ok(());
        };

        let serialized = serde_json::to_string(&next)?;
        self.backend.save(&self.key, &serialized).await?;

        let next: Arc<[Widget]> = next.into();
        *self.widgets.write().unwrap_or_else(PoisonError::into_inner) = next.clone();

        tracing::debug!(key = %self.key, ?kind, count = next.len(), "Widget collection committed");
        // Ignore the SendError: it only means there are no subscribers.
        let _ = self.events.send(StoreEvent {
            kind,
            widgets: next,
        });
        Ok(())
    }
}

/// Reorder `current` by `order`, rejecting anything that is not an exact
/// permutation of its ids.
fn permute(current: &[Widget], order: &[WidgetId]) -> Result<Vec<Widget>, StoreError> {
    if order.len() != current.len() {
        return Err(StoreError::NotAPermutation);
    }
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .map(|id| {
            if !seen.insert(id.as_str()) {
                return Err(StoreError::NotAPermutation);
            }
            current
                .iter()
                .find(|w| &w.id == id)
                .cloned()
                .ok_or(StoreError::NotAPermutation)
        })
        .collect()
}

/// Parse a stored collection, dropping later duplicates of an id.
fn decode_collection(key: &str, raw: &str) -> Vec<Widget> {
    let widgets: Vec<Widget> = match serde_json::from_str(raw) {
        Ok(widgets) => widgets,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Stored widgets are corrupt, starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    widgets
        .into_iter()
        .filter(|w| {
            let fresh = seen.insert(w.id.clone());
            if !fresh {
                tracing::warn!(key = %key, widget_id = %w.id, "Dropping duplicate stored widget");
            }
            fresh
        })
        .collect()
}
