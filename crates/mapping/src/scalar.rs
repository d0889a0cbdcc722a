//! Leaf mappings: coerce-and-assign, or delegate to a write function.
use std::fmt;
use std::sync::Arc;

use store::{AttributeValue, Context, PayloadValue};
use tracing::{debug, error, trace};

use crate::coerce::coerce;
use crate::error::{BoxError, MappingError};
use crate::schema::AttributeSchema;
use crate::transform::TransformChain;

/// Write function behind a [`CustomMap`].
pub type WriteFn<C> = dyn Fn(&mut C, &<C as Context>::Record, Option<&PayloadValue>) -> Result<(), BoxError>
    + Send
    + Sync;

/// Coerces one payload value and assigns it to a named attribute.
///
/// Assignment is idempotent: the record is only written when the coerced
/// value differs from what it already holds.
#[derive(Debug, Clone)]
pub struct AttributeMap {
    transforms: TransformChain,
    attribute: AttributeSchema,
}

impl AttributeMap {
    pub fn new(attribute: AttributeSchema) -> Self {
        Self::with_transforms(TransformChain::default(), attribute)
    }

    pub fn with_transforms(transforms: TransformChain, attribute: AttributeSchema) -> Self {
        Self {
            transforms,
            attribute,
        }
    }

    pub fn attribute(&self) -> &AttributeSchema {
        &self.attribute
    }

    pub fn transforms(&self) -> &TransformChain {
        &self.transforms
    }

    /// Transforms and coerces `raw` without touching any record.
    ///
    /// `Ok(None)` means the value is absent after transformation.
    pub fn coerce(&self, raw: Option<&PayloadValue>) -> Result<Option<AttributeValue>, MappingError> {
        let transformed = self.transforms.apply(raw).map_err(|err| {
            debug!(
                attribute = %self.attribute.name,
                step = %err.step,
                error = %err,
                "attribute_transform_rejected"
            );
            MappingError::attribute_transform_failed(self.attribute.name.clone(), raw.cloned(), err)
        })?;
        match transformed {
            None => Ok(None),
            Some(value) => match coerce(&value, self.attribute.kind) {
                Some(coerced) => Ok(Some(coerced)),
                None => Err(self.failure(Some(value))),
            },
        }
    }

    pub fn apply_value<C: Context>(
        &self,
        raw: Option<&PayloadValue>,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        let name = self.attribute.name.as_str();
        let next = match self.coerce(raw)? {
            Some(value) => Some(value),
            None if self.attribute.optional => None,
            None => match &self.attribute.default {
                Some(default) => Some(default.clone()),
                None => {
                    error!(attribute = name, "required_attribute_without_default");
                    return Err(self.failure(raw.cloned()));
                }
            },
        };

        if ctx.attribute(record, name) == next {
            trace!(attribute = name, "attribute_write_skipped");
            return Ok(());
        }

        debug!(
            attribute = name,
            kind = next.as_ref().map_or("absent", AttributeValue::type_name),
            "attribute_write"
        );
        ctx.set_attribute(record, name, next);
        Ok(())
    }

    fn failure(&self, value: Option<PayloadValue>) -> MappingError {
        MappingError::attribute_failed(self.attribute.name.clone(), value)
    }
}

/// Runs the transform chain, then hands the value to an arbitrary write function.
pub struct CustomMap<C: Context> {
    transforms: TransformChain,
    write: Arc<WriteFn<C>>,
}

impl<C: Context> Clone for CustomMap<C> {
    fn clone(&self) -> Self {
        Self {
            transforms: self.transforms.clone(),
            write: Arc::clone(&self.write),
        }
    }
}

impl<C: Context> fmt::Debug for CustomMap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMap")
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl<C: Context> CustomMap<C> {
    pub fn new<F>(transforms: TransformChain, write: F) -> Self
    where
        F: Fn(&mut C, &C::Record, Option<&PayloadValue>) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            transforms,
            write: Arc::new(write),
        }
    }

    pub fn apply_value(
        &self,
        raw: Option<&PayloadValue>,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        let value = self
            .transforms
            .apply(raw)
            .map_err(|err| MappingError::custom_failed(raw.cloned(), Box::new(err)))?;
        (self.write)(ctx, record, value.as_ref())
            .map_err(|err| MappingError::custom_failed(value.clone(), err))
    }
}

/// A leaf of the mapping tree.
pub enum ScalarMap<C: Context> {
    Attribute(AttributeMap),
    Custom(CustomMap<C>),
}

impl<C: Context> Clone for ScalarMap<C> {
    fn clone(&self) -> Self {
        match self {
            ScalarMap::Attribute(map) => ScalarMap::Attribute(map.clone()),
            ScalarMap::Custom(map) => ScalarMap::Custom(map.clone()),
        }
    }
}

impl<C: Context> fmt::Debug for ScalarMap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarMap::Attribute(map) => f.debug_tuple("Attribute").field(map).finish(),
            ScalarMap::Custom(map) => f.debug_tuple("Custom").field(map).finish(),
        }
    }
}

impl<C: Context> ScalarMap<C> {
    pub fn apply_value(
        &self,
        raw: Option<&PayloadValue>,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        match self {
            ScalarMap::Attribute(map) => map.apply_value(raw, ctx, record),
            ScalarMap::Custom(map) => map.apply_value(raw, ctx, record),
        }
    }
}
