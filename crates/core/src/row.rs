//! Loosely-typed result rows returned by the external stores.
//!
//! Stores hand back JSON-shaped rows; numeric columns may arrive as numbers
//! or as strings depending on the driver, so the accessors accept both.

use serde_json::Value;
use std::collections::HashMap;

pub type Row = HashMap<String, Value>;

/// Non-empty trimmed string value for a column, if present.
pub fn get_str(row: &Row, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric value for a column; unparseable or missing defaults to 0.0.
pub fn get_f64(row: &Row, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Count value for a column; negative or missing defaults to 0.
pub fn get_u64(row: &Row, key: &str) -> u64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0).max(0.0) as u64),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Signed integer value for a column (e.g. day deltas), defaulting to 0.
pub fn get_i64(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_string_access() {
        let r = row(&[("name", json!("  AdX ")), ("blank", json!("   ")), ("num", json!(42))]);
        assert_eq!(get_str(&r, "name").as_deref(), Some("AdX"));
        assert_eq!(get_str(&r, "blank"), None);
        assert_eq!(get_str(&r, "num").as_deref(), Some("42"));
        assert_eq!(get_str(&r, "missing"), None);
    }

    #[test]
    fn test_numeric_access_tolerates_strings() {
        let r = row(&[("a", json!("12.5")), ("b", json!(7)), ("c", json!("garbage"))]);
        assert_eq!(get_f64(&r, "a"), 12.5);
        assert_eq!(get_u64(&r, "b"), 7);
        assert_eq!(get_f64(&r, "c"), 0.0);
        assert_eq!(get_i64(&r, "missing"), 0);
    }
}
