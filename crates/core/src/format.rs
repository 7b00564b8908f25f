//! Display formatting for mapped values and chart timestamps.

use chrono::TimeZone;
use serde_json::Value;

use crate::widget::FieldFormat;

/// Rendered in place of a value that could not be resolved.
pub const PLACEHOLDER: &str = "--";

/// Rendered in place of a missing timestamp.
pub const EMPTY_TIME: &str = "\u{2014}";

/// Render a resolved value for display, applying the mapping's format.
///
/// Numeric formats apply to numbers and to strings that parse as numbers;
/// anything else is rendered as-is. `None` and `null` become [`PLACEHOLDER`].
pub fn format_value(value: Option<&Value>, format: Option<FieldFormat>) -> String {
    let Some(value) = value else {
        return PLACEHOLDER.to_string();
    };

    if let Some(format) = format {
        if let Some(n) = as_number(value) {
            return format_number(n, format);
        }
    }

    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a JSON value as a finite number, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn format_number(n: f64, format: FieldFormat) -> String {
    match format {
        FieldFormat::Currency => {
            let sign = if n < 0.0 { "-" } else { "" };
            format!("{sign}${}", group_thousands(&format!("{:.2}", n.abs())))
        }
        FieldFormat::Percentage => format!("{n:.2}%"),
        FieldFormat::Number => {
            let fixed = format!("{n:.2}");
            let trimmed = if fixed.contains('.') {
                fixed.trim_end_matches('0').trim_end_matches('.')
            } else {
                fixed.as_str()
            };
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", trimmed),
            };
            // "-0" after rounding is just zero.
            if digits == "0" {
                return "0".to_string();
            }
            format!("{sign}{}", group_thousands(digits))
        }
    }
}

/// Insert `,` separators into the integer part of an unsigned decimal string.
fn group_thousands(unsigned: &str) -> String {
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}

/// Format epoch milliseconds as `HH:MM:SS` (UTC). Zero renders as an em dash.
pub fn format_time(millis: i64) -> String {
    if millis == 0 {
        return EMPTY_TIME.to_string();
    }
    match chrono::Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.format("%H:%M:%S").to_string(),
        None => EMPTY_TIME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_and_null_render_placeholder() {
        assert_eq!(format_value(None, None), PLACEHOLDER);
        assert_eq!(format_value(Some(&Value::Null), None), PLACEHOLDER);
    }

    #[test]
    fn unformatted_values_render_plainly() {
        assert_eq!(format_value(Some(&json!("AAPL")), None), "AAPL");
        assert_eq!(format_value(Some(&json!(3)), None), "3");
        assert_eq!(format_value(Some(&json!(1.5)), None), "1.5");
        assert_eq!(format_value(Some(&json!(true)), None), "true");
    }

    #[test]
    fn currency_groups_and_rounds() {
        let f = Some(FieldFormat::Currency);
        assert_eq!(format_value(Some(&json!(1234.567)), f), "$1,234.57");
        assert_eq!(format_value(Some(&json!(-5)), f), "-$5.00");
        assert_eq!(format_value(Some(&json!("1000000")), f), "$1,000,000.00");
    }

    #[test]
    fn percentage_has_two_decimals() {
        assert_eq!(
            format_value(Some(&json!(12.3456)), Some(FieldFormat::Percentage)),
            "12.35%"
        );
    }

    #[test]
    fn number_trims_trailing_zeros() {
        let f = Some(FieldFormat::Number);
        assert_eq!(format_value(Some(&json!(1234567)), f), "1,234,567");
        assert_eq!(format_value(Some(&json!(0.5)), f), "0.5");
        assert_eq!(format_value(Some(&json!(-9876.126)), f), "-9,876.13");
        assert_eq!(format_value(Some(&json!(-0.001)), f), "0");
    }

    #[test]
    fn non_numeric_value_ignores_format() {
        assert_eq!(
            format_value(Some(&json!("n/a")), Some(FieldFormat::Currency)),
            "n/a"
        );
    }

    #[test]
    fn format_time_renders_utc_clock() {
        // 2023-11-14T22:13:20Z
        assert_eq!(format_time(1_700_000_000_000), "22:13:20");
        assert_eq!(format_time(0), EMPTY_TIME);
    }
}
