//! Report attributes
//!
//! Attributes are arbitrary key/value context attached to a report. Values
//! are a closed variant type decided at the API boundary so the report type
//! itself does not need a type parameter.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute bag carried by a report. Keys are unique; order is irrelevant.
pub type Attributes = HashMap<String, AttributeValue>;

/// A single attribute value
///
/// Serialized untagged, so `{"retries": 3, "region": "eu"}` round-trips
/// through JSON without wrapper objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Structured value (arrays, nested objects, null)
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Returns the string content if this is a string attribute
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        AttributeValue::Integer(i64::from(i))
    }
}

impl From<u32> for AttributeValue {
    fn from(i: u32) -> Self {
        AttributeValue::Integer(i64::from(i))
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        AttributeValue::Float(x)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Float)
                    .unwrap_or(AttributeValue::Json(serde_json::Value::Number(n))),
            },
            other => AttributeValue::Json(other),
        }
    }
}

/// Merges `overrides` on top of `base`.
///
/// When `overrides` is absent or empty the base map is returned borrowed and
/// untouched. Otherwise a new map is built in which keys from `overrides`
/// win on collision; `base` is never modified.
pub fn merge_attributes<'a>(
    base: &'a Attributes,
    overrides: Option<&Attributes>,
) -> Cow<'a, Attributes> {
    match overrides {
        Some(extra) if !extra.is_empty() => {
            let mut merged = base.clone();
            merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            Cow::Owned(merged)
        }
        _ => Cow::Borrowed(base),
    }
}
