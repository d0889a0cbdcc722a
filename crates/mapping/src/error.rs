//! Error types produced while applying mappings.
//!
//! Leaf failures start with an empty key path. Every enclosing
//! [`PayloadMap`](crate::PayloadMap) level prefixes the key it traversed, so
//! by the time an error reaches the caller its path names the full route from
//! the document root to the failing field.
//!
//! ```rust
//! use mapping::MappingError;
//! use store::PayloadValue;
//!
//! let err = MappingError::attribute_failed("age", Some(PayloadValue::from("old")))
//!     .prefixed("age")
//!     .prefixed("profile")
//!     .prefixed("author");
//!
//! assert_eq!(err.path(), "author.profile.age");
//! ```
use std::error::Error as StdError;
use std::sync::Arc;

use store::PayloadValue;
use thiserror::Error;

use crate::transform::TransformError;

/// Boxed error returned by custom write functions.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A payload value could not be written to a record.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum MappingError {
    /// The value could not be transformed or coerced into the attribute's kind,
    /// or a required attribute received no value and has no default.
    ///
    /// `source` is set when a transform step rejected the value.
    #[error("mapping failed at `{path}` for attribute `{attribute}` (value: {})", render(.value))]
    AttributeMappingFailed {
        path: String,
        attribute: String,
        value: Option<PayloadValue>,
        source: Option<TransformError>,
    },

    /// A custom write function (or its transforms) returned an error.
    #[error("custom mapping failed at `{path}` (value: {}): {source}", render(.value))]
    CustomMappingFailed {
        path: String,
        value: Option<PayloadValue>,
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },
}

fn render(value: &Option<PayloadValue>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "absent".to_string(),
    }
}

impl MappingError {
    pub fn attribute_failed(attribute: impl Into<String>, value: Option<PayloadValue>) -> Self {
        MappingError::AttributeMappingFailed {
            path: String::new(),
            attribute: attribute.into(),
            value,
            source: None,
        }
    }

    /// Attribute failure caused by a rejecting transform step.
    pub fn attribute_transform_failed(
        attribute: impl Into<String>,
        value: Option<PayloadValue>,
        source: TransformError,
    ) -> Self {
        MappingError::AttributeMappingFailed {
            path: String::new(),
            attribute: attribute.into(),
            value,
            source: Some(source),
        }
    }

    /// Transform step that rejected the value, if any.
    pub fn transform_error(&self) -> Option<&TransformError> {
        match self {
            MappingError::AttributeMappingFailed { source, .. } => source.as_ref(),
            MappingError::CustomMappingFailed { source, .. } => source.downcast_ref(),
        }
    }

    pub fn custom_failed(value: Option<PayloadValue>, source: BoxError) -> Self {
        MappingError::CustomMappingFailed {
            path: String::new(),
            value,
            source: Arc::from(source),
        }
    }

    /// Dotted key path from the document root to the failing field.
    pub fn path(&self) -> &str {
        match self {
            MappingError::AttributeMappingFailed { path, .. }
            | MappingError::CustomMappingFailed { path, .. } => path,
        }
    }

    pub fn value(&self) -> Option<&PayloadValue> {
        match self {
            MappingError::AttributeMappingFailed { value, .. }
            | MappingError::CustomMappingFailed { value, .. } => value.as_ref(),
        }
    }

    /// Prepends `key` to the key path.
    pub fn prefixed(mut self, key: &str) -> Self {
        let path = match &mut self {
            MappingError::AttributeMappingFailed { path, .. }
            | MappingError::CustomMappingFailed { path, .. } => path,
        };
        *path = if path.is_empty() {
            key.to_string()
        } else {
            format!("{key}.{path}")
        };
        self
    }
}
