//! Dotted-path lookup into arbitrary JSON.
//!
//! Absence is a normal outcome: [`resolve`] returns `None` instead of an
//! error whenever a segment is missing or the walk hits a scalar.

use serde_json::Value;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Resolve `path` against `root`.
///
/// Each segment must name an own key of the current object, or a decimal
/// index of the current array. Walking into a scalar or `null` yields `None`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(root, |acc, segment| step(acc, segment))
}

fn step<'a>(acc: &'a Value, segment: &str) -> Option<&'a Value> {
    match acc {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Only canonical decimal indices address array elements (`"01"` does not).
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Final segment of a dotted path (`"data.price"` -> `"price"`).
pub fn last_segment(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Field picker support
// ---------------------------------------------------------------------------

/// Walk `value` and list every leaf as `(path, value)` in document order.
///
/// Objects and arrays are containers; everything else (including `null`) is
/// a leaf. A scalar root has no addressable leaves.
pub fn leaf_paths(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    collect_leaves(value, "", &mut out);
    out
}

fn collect_leaves(value: &Value, parent: &str, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                visit_child(parent, key, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit_child(parent, &index.to_string(), child, out);
            }
        }
        _ => {}
    }
}

fn visit_child(parent: &str, key: &str, child: &Value, out: &mut Vec<(String, Value)>) {
    let path = if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{key}")
    };
    if child.is_object() || child.is_array() {
        collect_leaves(child, &path, out);
    } else {
        out.push((path, child.clone()));
    }
}
