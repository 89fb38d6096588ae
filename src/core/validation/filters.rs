//! Reusable field filters
//!
//! These filters transform field values before validation

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;

/// A boxed field filter
pub type Filter = Arc<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;

/// Filter: trim whitespace from string
pub fn trim() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        other => Ok(other),
    }
}

/// Filter: convert string to lowercase
pub fn lowercase() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Ok(other),
    }
}

/// Filter: normalize a timestamp to an RFC 3339 UTC string
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` and
/// integer milliseconds since the epoch. Null passes through.
pub fn timestamp() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |field: &str, value: Value| {
        let parsed = match &value {
            Value::Null => return Ok(value),
            Value::String(s) => parse_timestamp(s.trim()),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        };
        parsed
            .map(|dt| Value::String(format_timestamp(dt)))
            .ok_or_else(|| anyhow!("'{}' must be a valid date or timestamp", field))
    }
}

/// Current time in the format produced by [`timestamp`]
pub fn now() -> Value {
    Value::String(format_timestamp(Utc::now()))
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // === trim() ===

    #[test]
    fn test_trim_removes_whitespace() {
        let f = trim();
        let result = f("name", json!("  hello  ")).expect("should not fail");
        assert_eq!(result, json!("hello"));
    }

    #[test]
    fn test_trim_non_string_passthrough() {
        let f = trim();
        assert_eq!(f("age", json!(42)).expect("should not fail"), json!(42));
        assert_eq!(f("name", json!(null)).expect("should not fail"), json!(null));
    }

    // === lowercase() ===

    #[test]
    fn test_lowercase_converts_string() {
        let f = lowercase();
        let result = f("email", json!("Hello@WORLD.com")).expect("should not fail");
        assert_eq!(result, json!("hello@world.com"));
    }

    #[test]
    fn test_lowercase_non_string_passthrough() {
        let f = lowercase();
        let result = f("count", json!(true)).expect("should not fail");
        assert_eq!(result, json!(true));
    }

    // === timestamp() ===

    #[test]
    fn test_timestamp_normalizes_rfc3339_offset() {
        let f = timestamp();
        let result = f("createdAt", json!("2024-03-01T12:00:00+02:00")).expect("should not fail");
        assert_eq!(result, json!("2024-03-01T10:00:00.000Z"));
    }

    #[test]
    fn test_timestamp_accepts_sql_datetime_and_date() {
        let f = timestamp();
        assert_eq!(
            f("createdAt", json!("2024-03-01 08:30:00")).expect("should not fail"),
            json!("2024-03-01T08:30:00.000Z")
        );
        assert_eq!(
            f("createdAt", json!("2024-03-01")).expect("should not fail"),
            json!("2024-03-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_timestamp_accepts_epoch_millis() {
        let f = timestamp();
        let result = f("createdAt", json!(0)).expect("should not fail");
        assert_eq!(result, json!("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        let f = timestamp();
        let err = f("createdAt", json!("yesterday")).unwrap_err();
        assert!(err.to_string().contains("createdAt"));
        assert!(f("createdAt", json!(true)).is_err());
    }

    #[test]
    fn test_timestamp_null_passthrough() {
        let f = timestamp();
        assert_eq!(f("createdAt", json!(null)).expect("should not fail"), json!(null));
    }

    #[test]
    fn test_now_is_parseable() {
        let value = now();
        let text = value.as_str().expect("string");
        assert!(DateTime::parse_from_rfc3339(text).is_ok());
        assert!(text.ends_with('Z'));
    }
}
