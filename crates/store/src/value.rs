//! Value model shared by payloads and persisted records.
//!
//! Two value families flow through the engine:
//!
//! - [`PayloadValue`] is the loosely-typed side: whatever an external payload
//!   (typically a parsed JSON response) carries, plus a handful of typed
//!   variants that transform steps may produce (a date parsed from an ISO
//!   string, a UUID, raw bytes).
//! - [`AttributeValue`] is the strongly-typed side: the value a record
//!   actually stores for one attribute after coercion.
//!
//! # Example
//!
//! ```rust
//! use store::{document_from_json, PayloadValue};
//!
//! let doc = document_from_json(serde_json::json!({
//!     "id": "1",
//!     "profile": { "age": 30 }
//! }))
//! .unwrap();
//!
//! assert_eq!(doc.get("id"), Some(&PayloadValue::from("1")));
//! assert!(matches!(doc.get("profile"), Some(PayloadValue::Document(_))));
//! ```
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use url::Url;
use uuid::Uuid;

/// A payload document: keys in deterministic (sorted) order.
pub type Document = BTreeMap<String, PayloadValue>;

/// One node of an external payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Explicit null sentinel (JSON `null`).
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<PayloadValue>),
    Document(Document),
    /// Date-typed value; only ever produced by transforms, never by JSON.
    Date(DateTime<Utc>),
    Uuid(Uuid),
    Url(Url),
    Decimal(Decimal),
    Binary(Vec<u8>),
}

impl PayloadValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PayloadValue::Null)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            PayloadValue::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Short name of the variant, used in log fields and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PayloadValue::Null => "null",
            PayloadValue::Bool(_) => "bool",
            PayloadValue::Number(_) => "number",
            PayloadValue::String(_) => "string",
            PayloadValue::Array(_) => "array",
            PayloadValue::Document(_) => "document",
            PayloadValue::Date(_) => "date",
            PayloadValue::Uuid(_) => "uuid",
            PayloadValue::Url(_) => "url",
            PayloadValue::Decimal(_) => "decimal",
            PayloadValue::Binary(_) => "binary",
        }
    }

    /// Converts back into JSON. Typed variants render as strings, except
    /// binary which becomes an array of byte values.
    pub fn to_json(&self) -> Value {
        match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(*b),
            PayloadValue::Number(n) => Value::Number(n.clone()),
            PayloadValue::String(s) => Value::String(s.clone()),
            PayloadValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            PayloadValue::Document(doc) => Value::Object(
                doc.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            PayloadValue::Date(date) => {
                Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PayloadValue::Uuid(uuid) => Value::String(uuid.to_string()),
            PayloadValue::Url(url) => Value::String(url.to_string()),
            PayloadValue::Decimal(decimal) => Value::String(decimal.to_string()),
            PayloadValue::Binary(bytes) => {
                Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
            }
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => PayloadValue::Number(n),
            Value::String(s) => PayloadValue::String(s),
            Value::Array(items) => {
                PayloadValue::Array(items.into_iter().map(PayloadValue::from).collect())
            }
            Value::Object(map) => PayloadValue::Document(
                map.into_iter()
                    .map(|(key, value)| (key, PayloadValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Number(Number::from(value))
    }
}

impl From<f64> for PayloadValue {
    /// Non-finite floats have no JSON number form and become [`PayloadValue::Null`].
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(PayloadValue::Number)
            .unwrap_or(PayloadValue::Null)
    }
}

impl From<Document> for PayloadValue {
    fn from(value: Document) -> Self {
        PayloadValue::Document(value)
    }
}

/// Converts a JSON object into a [`Document`]. Returns `None` for non-objects.
pub fn document_from_json(value: Value) -> Option<Document> {
    match PayloadValue::from(value) {
        PayloadValue::Document(doc) => Some(doc),
        _ => None,
    }
}

/// Converts a JSON array of objects into documents, skipping non-object items.
/// A single top-level object yields a one-element batch.
pub fn documents_from_json(value: Value) -> Vec<Document> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(document_from_json).collect(),
        other => document_from_json(other).into_iter().collect(),
    }
}

/// A typed attribute value as stored on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Date(DateTime<Utc>),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Decimal(Decimal),
    Uuid(Uuid),
    Url(Url),
    Binary(Vec<u8>),
    /// Transformable / undefined attributes keep the payload shape verbatim.
    Opaque(PayloadValue),
}

impl AttributeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Date(_) => "date",
            AttributeValue::Int16(_) => "integer16",
            AttributeValue::Int32(_) => "integer32",
            AttributeValue::Int64(_) => "integer64",
            AttributeValue::Float(_) => "float",
            AttributeValue::Double(_) => "double",
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Decimal(_) => "decimal",
            AttributeValue::Uuid(_) => "uuid",
            AttributeValue::Url(_) => "url",
            AttributeValue::Binary(_) => "binary",
            AttributeValue::Opaque(_) => "opaque",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Widens any integer variant to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int16(v) => Some(i64::from(*v)),
            AttributeValue::Int32(v) => Some(i64::from(*v)),
            AttributeValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s:?}"),
            AttributeValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            AttributeValue::Int16(v) => write!(f, "{v}"),
            AttributeValue::Int32(v) => write!(f, "{v}"),
            AttributeValue::Int64(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{v}"),
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Decimal(v) => write!(f, "{v}"),
            AttributeValue::Uuid(v) => write!(f, "{v}"),
            AttributeValue::Url(v) => write!(f, "{v}"),
            AttributeValue::Binary(v) => write!(f, "<{} bytes>", v.len()),
            AttributeValue::Opaque(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_nested_documents() {
        let doc = document_from_json(json!({
            "id": 7,
            "author": { "name": "Ann", "tags": ["a", null] }
        }))
        .expect("object converts");

        let author = doc["author"].as_document().expect("nested document");
        assert_eq!(author["name"], PayloadValue::from("Ann"));
        assert_eq!(
            author["tags"],
            PayloadValue::Array(vec![PayloadValue::from("a"), PayloadValue::Null])
        );
    }

    #[test]
    fn non_objects_are_not_documents() {
        assert!(document_from_json(json!([1, 2])).is_none());
        assert!(document_from_json(json!("text")).is_none());
    }

    #[test]
    fn batches_skip_non_object_items() {
        let docs = documents_from_json(json!([{ "id": 1 }, 2, { "id": 3 }]));
        assert_eq!(docs.len(), 2);

        let single = documents_from_json(json!({ "id": 1 }));
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn typed_variants_render_as_json_strings() {
        let uuid = Uuid::nil();
        assert_eq!(PayloadValue::Uuid(uuid).to_json(), json!(uuid.to_string()));
        assert_eq!(PayloadValue::Binary(vec![1, 2]).to_json(), json!([1, 2]));
        assert_eq!(PayloadValue::from(f64::NAN), PayloadValue::Null);
    }

    #[test]
    fn integer_attributes_widen() {
        assert_eq!(AttributeValue::Int16(3).as_i64(), Some(3));
        assert_eq!(AttributeValue::Int32(-4).as_i64(), Some(-4));
        assert_eq!(AttributeValue::Double(1.0).as_i64(), None);
    }
}
