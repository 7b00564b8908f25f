//! Row/series extraction: pure functions from a raw response plus field
//! mappings to presentation-ready data.
//!
//! Nothing here touches the network or holds state across calls, except
//! [`SeriesHistory`], which callers own per binding.

pub mod rows;
pub mod series;
pub mod shape;
pub mod table;

use serde::Serialize;
use serde_json::Value;

pub use rows::{card_fields, extract_rows, source_rows, Cell, Row};
pub use series::{extract_series, reading_point, SeriesHistory, SeriesPoint, DEFAULT_HISTORY_CAPACITY};
pub use shape::{classify, ResponseShape};
pub use table::{filter_rows, paginate, Page, DEFAULT_PAGE_SIZE};

use crate::widget::{Widget, WidgetType};

/// Presentation-ready data for one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Rendered {
    Card(Vec<Cell>),
    Table(Vec<Row>),
    Chart(Vec<SeriesPoint>),
}

impl Rendered {
    /// `true` when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Card(cells) => cells.is_empty(),
            Self::Table(rows) => rows.is_empty(),
            Self::Chart(points) => points.is_empty(),
        }
    }
}

/// Shape `raw` the way `widget`'s type requires.
pub fn render(widget: &Widget, raw: &Value) -> Rendered {
    let mappings = &widget.field_mappings;
    match widget.widget_type {
        WidgetType::Card => Rendered::Card(card_fields(raw, mappings)),
        WidgetType::Table => Rendered::Table(extract_rows(raw, mappings)),
        WidgetType::Chart => Rendered::Chart(extract_series(raw, mappings)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::widget::{FieldMapping, WidgetDraft};

    fn widget(widget_type: WidgetType, path: &str) -> Widget {
        WidgetDraft::new("w", widget_type)
            .endpoint("https://example.com")
            .field(FieldMapping::new("Value", path))
            .build()
            .unwrap()
    }

    #[test]
    fn render_dispatches_on_widget_type() {
        let raw = json!([{"value": 1}, {"value": 2}]);

        assert_matches!(render(&widget(WidgetType::Table, "value"), &raw), Rendered::Table(rows) if rows.len() == 2);
        assert_matches!(render(&widget(WidgetType::Card, "value"), &raw), Rendered::Card(cells) if cells[0].display == "1");
        assert_matches!(render(&widget(WidgetType::Chart, "value"), &raw), Rendered::Chart(points) if points.len() == 2);
    }

    #[test]
    fn unrecognized_payload_renders_empty_table() {
        let rendered = render(&widget(WidgetType::Table, "value"), &json!("oops"));
        assert!(rendered.is_empty());
    }

    #[test]
    fn rendered_serializes_tagged() {
        let rendered = render(&widget(WidgetType::Card, "c"), &json!({"c": 2}));
        let json = serde_json::to_value(&rendered).unwrap();
        assert_eq!(json["type"], "card");
        assert_eq!(json["data"][0]["display"], "2");
    }
}
