//! Tabular row extraction for table and card widgets.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{json, Value};

use crate::extract::shape::{classify, ResponseShape};
use crate::format::format_value;
use crate::json_path::{last_segment, resolve};
use crate::widget::FieldMapping;

/// One mapped value, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub label: String,
    /// `None` when the mapping's path did not resolve.
    pub value: Option<Value>,
    /// Formatted text; a placeholder when `value` is `None`.
    pub display: String,
}

impl Cell {
    fn new(mapping: &FieldMapping, value: Option<&Value>) -> Self {
        Self {
            label: mapping.label.clone(),
            value: value.cloned(),
            display: format_value(value, mapping.format),
        }
    }
}

/// A row has exactly one cell per field mapping, in mapping order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

/// The raw records a response holds, before any field mapping is applied.
///
/// Primitive arrays are wrapped as `{value: p}` and metric objects become
/// `{metric: key, value: v}` records. Shapes without records yield nothing.
pub fn source_rows(raw: &Value) -> Vec<Cow<'_, Value>> {
    match classify(raw, None) {
        ResponseShape::ObjectArray(items) | ResponseShape::WrappedArray { items, .. } => {
            items.iter().map(Cow::Borrowed).collect()
        }
        ResponseShape::PrimitiveArray(items) => items
            .iter()
            .map(|p| Cow::Owned(json!({ "value": p })))
            .collect(),
        ResponseShape::MetricObject(metrics) => metrics
            .iter()
            .map(|(key, value)| Cow::Owned(json!({ "metric": key, "value": value })))
            .collect(),
        ResponseShape::PairedSeries { .. }
        | ResponseShape::Reading(_)
        | ResponseShape::Unrecognized => Vec::new(),
    }
}

/// Map every record through the field mappings.
///
/// Each mapping is resolved against a record by the last segment of its
/// path only, so `products.title` addresses `title` on each product.
pub fn extract_rows(raw: &Value, mappings: &[FieldMapping]) -> Vec<Row> {
    source_rows(raw)
        .iter()
        .map(|record| map_record(record, mappings))
        .collect()
}

fn map_record(record: &Value, mappings: &[FieldMapping]) -> Row {
    Row {
        cells: mappings
            .iter()
            .map(|m| Cell::new(m, resolve(record, last_segment(&m.json_path))))
            .collect(),
    }
}

/// Cells for a card: each full path resolved against the whole payload,
/// falling back to the first record for paths that miss.
pub fn card_fields(raw: &Value, mappings: &[FieldMapping]) -> Vec<Cell> {
    let records = source_rows(raw);
    let first = records.first();

    mappings
        .iter()
        .map(|m| {
            let value = resolve(raw, &m.json_path).or_else(|| {
                first.and_then(|record| resolve(record, last_segment(&m.json_path)))
            });
            Cell::new(m, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::format::PLACEHOLDER;
    use crate::widget::FieldFormat;

    fn values(rows: &[Row], col: usize) -> Vec<Option<Value>> {
        rows.iter().map(|r| r.cells[col].value.clone()).collect()
    }

    #[test]
    fn primitive_array_rows_expose_value_key() {
        let raw = json!([1, 2, 3]);
        let rows = extract_rows(&raw, &[FieldMapping::new("Value", "value")]);
        assert_eq!(
            values(&rows, 0),
            vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]
        );
    }

    #[test]
    fn normalized_primitive_array_gives_same_rows() {
        let raw = json!([{"value": 1}, {"value": 2}, {"value": 3}]);
        let rows = extract_rows(&raw, &[FieldMapping::new("Value", "value")]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].cells[0].display, "3");
    }

    #[test]
    fn wrapped_products_use_last_segment() {
        let raw = json!({
            "products": [
                {"title": "Phone", "price": 549},
                {"title": "Laptop"}
            ],
            "total": 2
        });
        let mappings = [
            FieldMapping::new("Title", "products.title"),
            FieldMapping::new("Price", "products.price").with_format(FieldFormat::Currency),
        ];
        let rows = extract_rows(&raw, &mappings);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[0].display, "Phone");
        assert_eq!(rows[0].cells[1].display, "$549.00");
        assert_eq!(rows[1].cells[1].value, None);
        assert_eq!(rows[1].cells[1].display, PLACEHOLDER);
    }

    #[test]
    fn metric_object_becomes_key_value_rows() {
        let raw = json!({"metric": {"beta": 1.25, "peNormalizedAnnual": 30.1}});
        let mappings = [
            FieldMapping::new("Metric", "metric"),
            FieldMapping::new("Value", "metric.value"),
        ];
        let rows = extract_rows(&raw, &mappings);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[0].display, "beta");
        assert_eq!(rows[0].cells[1].value, Some(json!(1.25)));
        assert_eq!(rows[1].cells[0].display, "peNormalizedAnnual");
    }

    #[test]
    fn reading_and_scalars_have_no_rows() {
        let mappings = [FieldMapping::new("Price", "c")];
        assert!(extract_rows(&json!({"c": 1.0}), &mappings).is_empty());
        assert!(extract_rows(&json!(5), &mappings).is_empty());
    }

    #[test]
    fn card_resolves_full_path_first() {
        let raw = json!({"c": 189.5, "quote": {"d": -1.2}});
        let mappings = [
            FieldMapping::new("Price", "c"),
            FieldMapping::new("Change", "quote.d"),
            FieldMapping::new("Missing", "quote.x"),
        ];
        let cells = card_fields(&raw, &mappings);
        assert_eq!(cells[0].value, Some(json!(189.5)));
        assert_eq!(cells[1].value, Some(json!(-1.2)));
        assert_eq!(cells[2].display, PLACEHOLDER);
    }

    #[test]
    fn card_falls_back_to_first_record() {
        let raw = json!({"data": [{"price": 10}, {"price": 20}]});
        let cells = card_fields(&raw, &[FieldMapping::new("Price", "data.price")]);
        assert_eq!(cells[0].value, Some(json!(10)));
    }
}
