//! Cell conversion helpers for Polars `AnyValue`s.

use polars::prelude::AnyValue;

/// Cell texts treated as a missing measurement.
pub const MISSING_TOKENS: [&str; 5] = ["", "na", "n/a", "nan", "null"];

/// Converts a cell to a trimmed string; `Null` becomes empty.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.trim().to_string(),
        AnyValue::StringOwned(s) => s.trim().to_string(),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        other => other.to_string(),
    }
}

/// Converts a numeric or numeric-looking cell to `f64`.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Reads an optional measurement.
///
/// `Ok(None)` for nulls, non-finite numbers and [`MISSING_TOKENS`];
/// `Err(text)` for anything else that is not a number.
pub fn measurement(value: AnyValue<'_>) -> Result<Option<f64>, String> {
    if let Some(number) = any_to_f64(value.clone()) {
        return Ok(number.is_finite().then_some(number));
    }
    let text = any_to_string(value);
    if is_missing_token(&text) {
        Ok(None)
    } else {
        Err(text)
    }
}

pub fn is_missing_token(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    MISSING_TOKENS.contains(&lowered.as_str())
}

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Formats a number without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
