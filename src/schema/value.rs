//! Field values
//!
//! `FieldValue` is both the raw input accepted by `Document::set` and the
//! canonical form a field holds once cast through its `TypeDescriptor`.
//! Plain attribute mappings (`Map`) only appear as raw input; casting an
//! Object field turns them into nested `Document`s.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::document::Document;

/// A raw or canonical field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    /// Ordered sequence
    List(Vec<FieldValue>),
    /// Plain attribute mapping, in insertion order
    Map(Vec<(String, FieldValue)>),
    /// Nested class instance
    Document(Box<Document>),
}

impl FieldValue {
    /// Returns the kind name used in cast and validation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::String(_) => "string",
            FieldValue::Date(_) => "date",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "mapping",
            FieldValue::Document(_) => "document",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Truthiness as used by the set-suppression rule: null, false, 0,
    /// NaN and the empty string are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FieldValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Identity comparison. Primitives compare by value; dates, lists,
    /// mappings and documents are fresh objects after every cast and never
    /// compare equal.
    pub fn strict_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            FieldValue::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Converts to the persisted JSON shape.
    ///
    /// Integral numbers are written without a fractional part, dates as
    /// RFC 3339 with millisecond precision, nested documents recursively.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => number_to_json(*n),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FieldValue::Document(doc) => doc.to_persisted(),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Document(doc) => write!(f, "{}", doc.schema().name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Document> for FieldValue {
    fn from(value: Document) -> Self {
        FieldValue::Document(Box::new(value))
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::Null.is_truthy());
        assert!(!FieldValue::Bool(false).is_truthy());
        assert!(!FieldValue::Number(0.0).is_truthy());
        assert!(!FieldValue::Number(f64::NAN).is_truthy());
        assert!(!FieldValue::from("").is_truthy());
        assert!(FieldValue::from("a").is_truthy());
        assert!(FieldValue::List(vec![]).is_truthy());
    }

    #[test]
    fn test_strict_eq_compounds_never_equal() {
        let a = FieldValue::from(vec![1, 2]);
        assert!(!a.strict_eq(&a.clone()));
        assert!(FieldValue::from(3).strict_eq(&FieldValue::Number(3.0)));
        assert!(!FieldValue::from("3").strict_eq(&FieldValue::Number(3.0)));
    }

    #[test]
    fn test_from_json_preserves_mapping_order() {
        let value = FieldValue::from(json!({ "b": 1, "a": [true, null] }));
        match value {
            FieldValue::Map(entries) => {
                let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["b", "a"]);
                assert_eq!(
                    entries[1].1,
                    FieldValue::List(vec![FieldValue::Bool(true), FieldValue::Null])
                );
            }
            other => panic!("expected mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_integral_numbers_persist_as_integers() {
        assert_eq!(FieldValue::Number(3.0).to_json(), json!(3));
        assert_eq!(FieldValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(FieldValue::Number(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::from("abc").to_string(), "abc");
        assert_eq!(FieldValue::from(4).to_string(), "4");
        assert_eq!(FieldValue::from(vec![1, 2]).to_string(), "[1,2]");
    }
}
