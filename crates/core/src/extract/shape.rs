//! Classification of raw API responses into a closed set of shapes.

use serde_json::{Map, Value};

/// Keys probed, in order, for an array wrapped inside an object.
pub const WRAPPER_KEYS: &[&str] = &["products", "data"];

/// Key holding a `{name: value}` metric object.
pub const METRIC_KEY: &str = "metric";

/// Keys probed for the timestamp half of a paired time series.
pub const SERIES_TIME_KEYS: &[&str] = &["t", "timestamps", "time"];

/// Keys probed for the value half when the field mapping doesn't name one.
pub const SERIES_VALUE_KEYS: &[&str] = &["c", "values"];

/// Every response shape the extractors know how to handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape<'a> {
    /// Top-level array of scalars, e.g. `["MSFT", "GOOG"]`.
    PrimitiveArray(&'a [Value]),
    /// Top-level array of objects or nested arrays (also any empty array).
    ObjectArray(&'a [Value]),
    /// Array found under one of [`WRAPPER_KEYS`].
    WrappedArray {
        key: &'static str,
        items: &'a [Value],
    },
    /// Object under [`METRIC_KEY`] whose entries become rows.
    MetricObject(&'a Map<String, Value>),
    /// Parallel timestamp / value arrays.
    PairedSeries {
        times: &'a [Value],
        values: &'a [Value],
    },
    /// Any other object: a single "current reading".
    Reading(&'a Map<String, Value>),
    /// Scalars and `null`.
    Unrecognized,
}

impl ResponseShape<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrimitiveArray(_) => "primitive_array",
            Self::ObjectArray(_) => "object_array",
            Self::WrappedArray { .. } => "wrapped_array",
            Self::MetricObject(_) => "metric_object",
            Self::PairedSeries { .. } => "paired_series",
            Self::Reading(_) => "reading",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Classify `raw`.
///
/// `value_key` is the preferred key for the value half of a paired series
/// (normally the last segment of the first field mapping).
pub fn classify<'a>(raw: &'a Value, value_key: Option<&str>) -> ResponseShape<'a> {
    match raw {
        Value::Array(items) => match items.first() {
            Some(first) if !(first.is_object() || first.is_array()) => {
                ResponseShape::PrimitiveArray(items)
            }
            _ => ResponseShape::ObjectArray(items),
        },
        Value::Object(map) => classify_object(map, value_key),
        _ => ResponseShape::Unrecognized,
    }
}

fn classify_object<'a>(map: &'a Map<String, Value>, value_key: Option<&str>) -> ResponseShape<'a> {
    for key in WRAPPER_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            return ResponseShape::WrappedArray { key: *key, items };
        }
    }

    if let Some(Value::Object(metrics)) = map.get(METRIC_KEY) {
        return ResponseShape::MetricObject(metrics);
    }

    if let Some((times, values)) = paired_arrays(map, value_key) {
        return ResponseShape::PairedSeries { times, values };
    }

    ResponseShape::Reading(map)
}

fn paired_arrays<'a>(
    map: &'a Map<String, Value>,
    value_key: Option<&str>,
) -> Option<(&'a [Value], &'a [Value])> {
    let times = SERIES_TIME_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_array))
        .filter(|t| !t.is_empty())?;

    let values = value_key
        .into_iter()
        .chain(SERIES_VALUE_KEYS.iter().copied())
        .filter(|k| !SERIES_TIME_KEYS.iter().any(|t| t == k))
        .find_map(|k| map.get(k).and_then(Value::as_array))?;

    Some((times.as_slice(), values.as_slice()))
}
