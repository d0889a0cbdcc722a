//! Attribute schema consumed by mappings.
//!
//! The engine never defines an entity schema itself. Callers describe each
//! persisted attribute once (name, kind, optionality, default) and hand the
//! descriptions to the map builder.
use serde::{Deserialize, Serialize};
use store::AttributeValue;

/// Declared scalar type of a persisted attribute.
///
/// Serialized in `snake_case` (`integer32`, `transformable`, ...) so schemas
/// can be declared in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Date,
    Integer16,
    Integer32,
    Integer64,
    Float,
    Double,
    Boolean,
    Decimal,
    Uuid,
    Url,
    Binary,
    Transformable,
    Undefined,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Date => "date",
            ScalarKind::Integer16 => "integer16",
            ScalarKind::Integer32 => "integer32",
            ScalarKind::Integer64 => "integer64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Uuid => "uuid",
            ScalarKind::Url => "url",
            ScalarKind::Binary => "binary",
            ScalarKind::Transformable => "transformable",
            ScalarKind::Undefined => "undefined",
        }
    }
}

/// One persisted attribute: name, kind, optionality, and an optional default.
///
/// # Example
///
/// ```rust
/// use mapping::{AttributeSchema, ScalarKind};
/// use store::AttributeValue;
///
/// let age = AttributeSchema::integer32("age").optional();
/// assert!(age.optional);
///
/// let status = AttributeSchema::string("status").with_default(AttributeValue::from("new"));
/// assert_eq!(status.kind, ScalarKind::String);
/// assert!(!status.optional);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    pub name: String,
    pub kind: ScalarKind,
    pub optional: bool,
    /// Written when a non-optional attribute receives an absent value.
    pub default: Option<AttributeValue>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, default: AttributeValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::String)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Date)
    }

    pub fn integer16(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Integer16)
    }

    pub fn integer32(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Integer32)
    }

    pub fn integer64(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Integer64)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Float)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Double)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Boolean)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Decimal)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Uuid)
    }

    pub fn url(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Url)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Binary)
    }

    pub fn transformable(name: impl Into<String>) -> Self {
        Self::new(name, ScalarKind::Transformable)
    }
}
