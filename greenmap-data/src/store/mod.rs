//! Record stores
//!
//! Relational data reaches the service through [`RecordStore`]. Production
//! uses [`OracleStore`]; [`MemoryStore`] backs tests and file-only setups.

mod memory;
#[cfg(feature = "oracle")]
mod oracle_store;

use greenmap_common::Result;
use serde_json::Value;
use std::fmt;

pub use memory::MemoryStore;
#[cfg(feature = "oracle")]
pub use oracle_store::OracleStore;

/// One table row: column name to JSON value, in column order
pub type Record = serde_json::Map<String, Value>;

/// A lookup key taken from a record column
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl KeyValue {
    /// Convert a column value into a key; `null` and composite values are not keys
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(KeyValue::Int)
                .or_else(|| n.as_f64().map(KeyValue::Float)),
            Value::String(s) if !s.is_empty() => Some(KeyValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Whether a column value equals this key
    ///
    /// Numbers compare numerically and numeric text compares against numbers,
    /// so `"42"` finds a row whose key column holds `42`.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (KeyValue::Text(key), Value::String(s)) => key == s,
            (KeyValue::Text(key), Value::Number(n)) => key
                .trim()
                .parse::<f64>()
                .ok()
                .zip(n.as_f64())
                .is_some_and(|(a, b)| a == b),
            (KeyValue::Int(key), Value::Number(n)) => match n.as_i64() {
                Some(v) => v == *key,
                None => n.as_f64() == Some(*key as f64),
            },
            (KeyValue::Float(key), Value::Number(n)) => n.as_f64() == Some(*key),
            (KeyValue::Int(key), Value::String(s)) => s.trim().parse::<i64>().ok() == Some(*key),
            _ => false,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Float(v) => write!(f, "{v}"),
            KeyValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Read-only access to relational tables
pub trait RecordStore: Send + Sync {
    /// Every row of `table`
    fn fetch_all(&self, table: &str) -> Result<Vec<Record>>;

    /// The first row of `table` whose `column` equals `key`
    fn fetch_by_key(&self, table: &str, column: &str, key: &KeyValue) -> Result<Option<Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_from_json() {
        assert_eq!(KeyValue::from_json(&json!(7)), Some(KeyValue::Int(7)));
        assert_eq!(KeyValue::from_json(&json!(7.5)), Some(KeyValue::Float(7.5)));
        assert_eq!(
            KeyValue::from_json(&json!("SSSI-12")),
            Some(KeyValue::Text("SSSI-12".into()))
        );
        assert_eq!(KeyValue::from_json(&json!("")), None);
        assert_eq!(KeyValue::from_json(&Value::Null), None);
        assert_eq!(KeyValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_key_matching_across_types() {
        assert!(KeyValue::Int(42).matches(&json!(42)));
        assert!(KeyValue::Int(42).matches(&json!(42.0)));
        assert!(KeyValue::Int(42).matches(&json!("42")));
        assert!(KeyValue::Text("42".into()).matches(&json!(42)));
        assert!(KeyValue::Text("LNR1".into()).matches(&json!("LNR1")));
        assert!(!KeyValue::Text("LNR1".into()).matches(&json!("LNR2")));
        assert!(!KeyValue::Int(1).matches(&Value::Null));
    }
}
