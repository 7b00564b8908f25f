//! Widget configuration model.
//!
//! A [`Widget`] binds one JSON endpoint, an ordered list of
//! [`FieldMapping`]s, and a presentation type. The serialized form uses
//! camelCase keys so collections written by earlier builds of the
//! dashboard load unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EpochMillis, WidgetId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Refresh interval assigned by [`WidgetDraft::build`] when none is given.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Presentation type; decides which extractor shapes the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    Card,
    Table,
    Chart,
}

impl WidgetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Table => "table",
            Self::Chart => "chart",
        }
    }
}

/// Optional display format applied to a mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    Currency,
    Percentage,
    Number,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Where and how often a widget fetches its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Endpoint URL. An empty endpoint disables fetching for the widget.
    pub endpoint: String,
    /// Seconds between scheduled fetches. Always greater than zero.
    #[serde(rename = "refreshInterval")]
    pub refresh_interval_secs: u64,
    /// Extra query parameters appended to the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

/// One labelled value selected out of an API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub label: String,
    /// Dotted path inside the response, e.g. `data.price`.
    pub json_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FieldFormat>,
}

impl FieldMapping {
    pub fn new(label: impl Into<String>, json_path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            json_path: json_path.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A user-configured dashboard widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    /// Assigned at creation, never changes.
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    pub api_config: ApiConfig,
    /// Order controls column/row order in the rendered output.
    pub field_mappings: Vec<FieldMapping>,
    pub display_config: DisplayConfig,
    /// Creation time in epoch milliseconds, never changes.
    pub created_at: EpochMillis,
}

/// Identity of a live data binding. Changing either half invalidates the
/// snapshot held for the old key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub widget_id: WidgetId,
    pub endpoint: String,
}

impl Widget {
    /// `false` only when the endpoint is empty; such widgets never fetch.
    /// A whitespace-only endpoint is enabled and fails as an invalid URL.
    pub fn is_enabled(&self) -> bool {
        !self.api_config.endpoint.is_empty()
    }

    pub fn binding_key(&self) -> BindingKey {
        BindingKey {
            widget_id: self.id.clone(),
            endpoint: self.api_config.endpoint.clone(),
        }
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api_config.refresh_interval_secs)
    }

    /// `true` when `other` can keep this widget's live binding: same key and
    /// same cadence. Title, description, and mapping edits don't restart it.
    pub fn shares_binding_with(&self, other: &Widget) -> bool {
        self.binding_key() == other.binding_key()
            && self.api_config.refresh_interval_secs == other.api_config.refresh_interval_secs
            && self.api_config.params == other.api_config.params
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check the invariants a committed widget must satisfy.
///
/// The endpoint is allowed to be empty (the widget is simply disabled).
pub fn validate_widget(widget: &Widget) -> Result<(), CoreError> {
    if widget.id.trim().is_empty() {
        return Err(CoreError::Validation("Widget id must not be empty".to_string()));
    }
    if widget.display_config.title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Widget title must not be empty".to_string(),
        ));
    }
    if widget.api_config.refresh_interval_secs == 0 {
        return Err(CoreError::Validation(
            "Refresh interval must be greater than zero".to_string(),
        ));
    }
    if widget.field_mappings.is_empty() {
        return Err(CoreError::Validation(
            "Widget must have at least one field mapping".to_string(),
        ));
    }
    if let Some(pos) = widget
        .field_mappings
        .iter()
        .position(|m| m.json_path.is_empty())
    {
        return Err(CoreError::Validation(format!(
            "Field mapping {pos} has an empty JSON path"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Draft / builder
// ---------------------------------------------------------------------------

/// Widget under construction, before it has an id.
///
/// Mappings may be empty while the user is still picking fields;
/// [`build`](Self::build) refuses to commit until at least one is present.
#[derive(Debug, Clone)]
pub struct WidgetDraft {
    pub title: String,
    pub widget_type: WidgetType,
    pub endpoint: String,
    pub refresh_interval_secs: Option<u64>,
    pub params: Option<BTreeMap<String, String>>,
    pub field_mappings: Vec<FieldMapping>,
    pub description: Option<String>,
}

impl WidgetDraft {
    pub fn new(title: impl Into<String>, widget_type: WidgetType) -> Self {
        Self {
            title: title.into(),
            widget_type,
            endpoint: String::new(),
            refresh_interval_secs: None,
            params: None,
            field_mappings: Vec::new(),
            description: None,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = Some(secs);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field picked from the explorer. Mappings keep insertion order.
    pub fn field(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    /// Assign an id and creation time, then validate.
    pub fn build(self) -> Result<Widget, CoreError> {
        let widget = Widget {
            id: uuid::Uuid::new_v4().to_string(),
            widget_type: self.widget_type,
            api_config: ApiConfig {
                endpoint: self.endpoint.trim().to_string(),
                refresh_interval_secs: self
                    .refresh_interval_secs
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
                params: self.params,
            },
            field_mappings: self.field_mappings,
            display_config: DisplayConfig {
                title: self.title.trim().to_string(),
                description: self.description,
            },
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        validate_widget(&widget)?;
        Ok(widget)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
