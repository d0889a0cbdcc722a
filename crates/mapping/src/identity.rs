//! Identity normalization: how a payload document is matched to a record.
//!
//! A document's identity is its identity-key value, run through the identity
//! transform chain and coerced to the identity attribute's kind. A record's
//! identity is the stored value of the identity attribute. Both sides end up
//! as the same hashable [`Identity`], so `"1"` in a payload matches a stored
//! `Int64(1)`.
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use store::{AttributeValue, Document, PayloadValue};
use url::Url;
use uuid::Uuid;

use crate::error::MappingError;
use crate::scalar::AttributeMap;
use crate::schema::AttributeSchema;

/// Hashable, normalized identity value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Text(String),
    /// Every integer width widens to `i64`.
    Integer(i64),
    /// Bit pattern of the `f64` value, with `-0.0` folded into `0.0`.
    Float(u64),
    Bool(bool),
    Decimal(Decimal),
    Uuid(Uuid),
    Url(Url),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    /// JSON rendering of a transformable value.
    Opaque(String),
}

impl Identity {
    fn float(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        Identity::Float(value.to_bits())
    }
}

impl From<&AttributeValue> for Identity {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => Identity::Text(s.clone()),
            AttributeValue::Int16(v) => Identity::Integer(i64::from(*v)),
            AttributeValue::Int32(v) => Identity::Integer(i64::from(*v)),
            AttributeValue::Int64(v) => Identity::Integer(*v),
            AttributeValue::Float(v) => Identity::float(f64::from(*v)),
            AttributeValue::Double(v) => Identity::float(*v),
            AttributeValue::Bool(v) => Identity::Bool(*v),
            AttributeValue::Decimal(v) => Identity::Decimal(v.normalize()),
            AttributeValue::Uuid(v) => Identity::Uuid(*v),
            AttributeValue::Url(v) => Identity::Url(v.clone()),
            AttributeValue::Date(v) => Identity::Date(*v),
            AttributeValue::Binary(v) => Identity::Binary(v.clone()),
            AttributeValue::Opaque(v) => Identity::Opaque(v.to_string()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Text(s) => write!(f, "{s:?}"),
            Identity::Integer(v) => write!(f, "{v}"),
            Identity::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Identity::Bool(v) => write!(f, "{v}"),
            Identity::Decimal(v) => write!(f, "{v}"),
            Identity::Uuid(v) => write!(f, "{v}"),
            Identity::Url(v) => write!(f, "{v}"),
            Identity::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Identity::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Identity::Opaque(v) => f.write_str(v),
        }
    }
}

/// A document identity: the typed value to query with, and its hashable form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedIdentity {
    pub value: AttributeValue,
    pub identity: Identity,
}

/// The identity key of a map and the attribute mapping that stores it.
#[derive(Debug, Clone)]
pub struct IdentityMapping {
    key: String,
    map: AttributeMap,
}

impl IdentityMapping {
    pub fn new(key: impl Into<String>, map: AttributeMap) -> Self {
        Self {
            key: key.into(),
            map,
        }
    }

    /// Payload key holding the identity.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attribute(&self) -> &AttributeSchema {
        self.map.attribute()
    }

    pub fn map(&self) -> &AttributeMap {
        &self.map
    }

    /// Normalizes an already-extracted raw identity value. `Ok(None)` means absent.
    pub fn normalize(
        &self,
        raw: Option<&PayloadValue>,
    ) -> Result<Option<NormalizedIdentity>, MappingError> {
        let coerced = self.map.coerce(raw).map_err(|err| err.prefixed(&self.key))?;
        Ok(coerced.map(|value| NormalizedIdentity {
            identity: Identity::from(&value),
            value,
        }))
    }

    /// Extracts and normalizes the identity of a payload document.
    pub fn extract(&self, document: &Document) -> Result<Option<NormalizedIdentity>, MappingError> {
        self.normalize(document.get(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{TransformChain, ValueTransform};

    fn doc(pairs: &[(&str, PayloadValue)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn payload_and_record_identities_agree() {
        let mapping = IdentityMapping::new("id", AttributeMap::new(AttributeSchema::integer64("remote_id")));
        let extracted = mapping
            .extract(&doc(&[("id", PayloadValue::from("17"))]))
            .expect("coerces")
            .expect("present");

        assert_eq!(extracted.value, AttributeValue::Int64(17));
        assert_eq!(extracted.identity, Identity::from(&AttributeValue::Int64(17)));
        assert_eq!(extracted.identity, Identity::from(&AttributeValue::Int32(17)));
    }

    #[test]
    fn null_and_missing_identities_are_absent() {
        let mapping = IdentityMapping::new("id", AttributeMap::new(AttributeSchema::string("id")));
        assert_eq!(mapping.extract(&doc(&[])).expect("ok"), None);
        assert_eq!(
            mapping.extract(&doc(&[("id", PayloadValue::Null)])).expect("ok"),
            None
        );
    }

    #[test]
    fn identity_transforms_apply() {
        let lower = ValueTransform::map("lowercase", |value| match value {
            PayloadValue::String(s) => Some(PayloadValue::String(s.to_lowercase())),
            other => Some(other),
        });
        let mapping = IdentityMapping::new(
            "email",
            AttributeMap::with_transforms(TransformChain::new([lower]), AttributeSchema::string("email")),
        );
        let extracted = mapping
            .normalize(Some(&PayloadValue::from("Ann@Example.com")))
            .expect("ok")
            .expect("present");
        assert_eq!(extracted.identity, Identity::Text("ann@example.com".into()));
    }

    #[test]
    fn uncoercible_identities_fail_with_the_key_path() {
        let mapping = IdentityMapping::new("uid", AttributeMap::new(AttributeSchema::uuid("uid")));
        let err = mapping
            .extract(&doc(&[("uid", PayloadValue::from("bad"))]))
            .expect_err("malformed");
        assert_eq!(err.path(), "uid");
    }

    #[test]
    fn signed_zero_and_decimal_scale_normalize() {
        assert_eq!(
            Identity::from(&AttributeValue::Double(-0.0)),
            Identity::from(&AttributeValue::Double(0.0))
        );
        assert_eq!(
            Identity::from(&AttributeValue::Decimal(Decimal::new(100, 2))),
            Identity::from(&AttributeValue::Decimal(Decimal::new(1, 0)))
        );
    }
}
