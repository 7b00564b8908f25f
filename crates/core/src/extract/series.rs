//! Time-ordered numeric series for chart widgets.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use crate::extract::rows::source_rows;
use crate::extract::shape::{classify, ResponseShape};
use crate::format::{as_number, format_time};
use crate::json_path::{last_segment, resolve};
use crate::types::Timestamp;
use crate::widget::FieldMapping;

/// Record keys checked for a per-row timestamp in generic row series.
pub const ROW_TIME_KEYS: &[&str] = &["timestamp", "time", "t"];

/// Timestamps below this are taken to be epoch seconds rather than millis.
const SECONDS_CUTOFF: f64 = 1e11;

/// Default capacity of a [`SeriesHistory`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// One chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Formatted time, or the row index when the data carries no time.
    pub x: String,
    pub y: f64,
}

/// Build a series from a response using the first field mapping.
///
/// Paired timestamp/value arrays are zipped; anything else goes through row
/// extraction. Points whose value is not numeric are dropped.
pub fn extract_series(raw: &Value, mappings: &[FieldMapping]) -> Vec<SeriesPoint> {
    let Some(mapping) = mappings.first() else {
        return Vec::new();
    };
    let value_key = last_segment(&mapping.json_path);

    if let ResponseShape::PairedSeries { times, values } = classify(raw, Some(value_key)) {
        return times
            .iter()
            .zip(values)
            .filter_map(|(t, v)| {
                let millis = epoch_millis(as_number(t)?);
                Some(SeriesPoint {
                    x: format_time(millis),
                    y: as_number(v)?,
                })
            })
            .collect();
    }

    source_rows(raw)
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let y = resolve(record, value_key).and_then(as_number)?;
            let x = row_time(record)
                .map(format_time)
                .unwrap_or_else(|| index.to_string());
            Some(SeriesPoint { x, y })
        })
        .collect()
}

/// The value a single-reading response contributes to a rolling history.
///
/// Returns `None` unless `raw` is a plain object whose first mapping
/// resolves to a number.
pub fn reading_point(
    raw: &Value,
    mappings: &[FieldMapping],
    observed_at: Timestamp,
) -> Option<SeriesPoint> {
    let mapping = mappings.first()?;
    if !matches!(classify(raw, None), ResponseShape::Reading(_)) {
        return None;
    }
    let y = resolve(raw, &mapping.json_path).and_then(as_number)?;
    Some(SeriesPoint {
        x: format_time(observed_at.timestamp_millis()),
        y,
    })
}

fn row_time(record: &Value) -> Option<i64> {
    ROW_TIME_KEYS
        .iter()
        .find_map(|k| record.get(*k).and_then(as_number))
        .map(epoch_millis)
}

fn epoch_millis(t: f64) -> i64 {
    if t.abs() < SECONDS_CUTOFF {
        (t * 1000.0) as i64
    } else {
        t as i64
    }
}

// ---------------------------------------------------------------------------
// Rolling history
// ---------------------------------------------------------------------------

/// Capped window of the most recent points; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct SeriesHistory {
    capacity: usize,
    points: VecDeque<SeriesPoint>,
}

impl SeriesHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: SeriesPoint) {
        if self.capacity == 0 {
            return;
        }
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Points oldest first.
    pub fn points(&self) -> Vec<SeriesPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for SeriesHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn point(y: f64) -> SeriesPoint {
        SeriesPoint {
            x: y.to_string(),
            y,
        }
    }

    // -----------------------------------------------------------------------
    // extract_series
    // -----------------------------------------------------------------------

    #[test]
    fn paired_arrays_zip_and_drop_non_numeric() {
        let raw = json!({
            "t": [1_700_000_000, 1_700_000_060, 1_700_000_120],
            "c": [189.5, null, "190.25"],
            "s": "ok"
        });
        let series = extract_series(&raw, &[FieldMapping::new("Close", "c")]);
        assert_eq!(
            series,
            vec![
                SeriesPoint { x: "22:13:20".into(), y: 189.5 },
                SeriesPoint { x: "22:15:20".into(), y: 190.25 },
            ]
        );
    }

    #[test]
    fn paired_arrays_accept_millisecond_timestamps() {
        let raw = json!({"timestamps": [1_700_000_000_000_i64], "values": [1]});
        let series = extract_series(&raw, &[FieldMapping::new("V", "values")]);
        assert_eq!(series[0].x, "22:13:20");
    }

    #[test]
    fn rows_fall_back_to_index_axis() {
        let raw = json!({"products": [{"price": 10}, {"price": "x"}, {"price": 12.5}]});
        let series = extract_series(&raw, &[FieldMapping::new("Price", "products.price")]);
        assert_eq!(
            series,
            vec![
                SeriesPoint { x: "0".into(), y: 10.0 },
                SeriesPoint { x: "2".into(), y: 12.5 },
            ]
        );
    }

    #[test]
    fn rows_with_timestamps_use_time_axis() {
        let raw = json!([{"timestamp": 1_700_000_000_000_i64, "v": 3}]);
        let series = extract_series(&raw, &[FieldMapping::new("V", "v")]);
        assert_eq!(series[0].x, "22:13:20");
    }

    #[test]
    fn only_first_mapping_is_charted() {
        let raw = json!([{"a": 1, "b": 2}]);
        let series = extract_series(
            &raw,
            &[FieldMapping::new("A", "a"), FieldMapping::new("B", "b")],
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].y, 1.0);
    }

    #[test]
    fn no_mappings_no_series() {
        assert!(extract_series(&json!([{"a": 1}]), &[]).is_empty());
    }

    // -----------------------------------------------------------------------
    // reading_point
    // -----------------------------------------------------------------------

    #[test]
    fn reading_point_from_quote() {
        let at = chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let raw = json!({"c": 189.5, "h": 190.0});
        let p = reading_point(&raw, &[FieldMapping::new("Price", "c")], at).unwrap();
        assert_eq!(p, SeriesPoint { x: "22:13:20".into(), y: 189.5 });
    }

    #[test]
    fn reading_point_ignores_arrays_and_non_numbers() {
        let at = chrono::Utc::now();
        let m = [FieldMapping::new("Price", "c")];
        assert!(reading_point(&json!([{"c": 1}]), &m, at).is_none());
        assert!(reading_point(&json!({"c": "n/a"}), &m, at).is_none());
    }

    // -----------------------------------------------------------------------
    // SeriesHistory
    // -----------------------------------------------------------------------

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = SeriesHistory::new(3);
        for y in 1..=5 {
            history.push(point(f64::from(y)));
        }
        let ys: Vec<f64> = history.points().iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![3.0, 4.0, 5.0]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_capacity_history_stays_empty() {
        let mut history = SeriesHistory::new(0);
        history.push(point(1.0));
        assert!(history.is_empty());
    }

    #[test]
    fn clear_empties_history() {
        let mut history = SeriesHistory::default();
        history.push(point(1.0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}
