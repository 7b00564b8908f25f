//! Pulseboard core: widget model and pure data shaping.
//!
//! - [`widget`]: widget configuration, validation, and the draft builder.
//! - [`json_path`]: dotted-path resolution and the field-picker leaf walk.
//! - [`extract`]: response classification, rows, cards, series, tables.
//! - [`format`]: value and timestamp display formatting.

pub mod error;
pub mod extract;
pub mod format;
pub mod json_path;
pub mod types;
pub mod widget;

pub use error::CoreError;
pub use widget::{
    validate_widget, ApiConfig, BindingKey, DisplayConfig, FieldFormat, FieldMapping, Widget,
    WidgetDraft, WidgetType,
};
