//! Type-erased façade over "something that applies a payload to a record".
//!
//! Ingesters hold a [`PayloadApplicator`] rather than a concrete
//! [`PayloadMap`], so callers can substitute a hand-written apply function for
//! a single call (or wrap a map with extra behaviour) without changing the
//! ingester's type.
use std::fmt;
use std::sync::Arc;

use store::{Context, Document};

use crate::error::MappingError;
use crate::map::PayloadMap;

/// Applies a payload document to a record held by a context.
pub trait ApplyPayload<C: Context> {
    fn apply_payload(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError>;
}

impl<C: Context> ApplyPayload<C> for PayloadMap<C> {
    fn apply_payload(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        self.apply(document, ctx, record)
    }
}

struct FnApplicator<F>(F);

impl<C, F> ApplyPayload<C> for FnApplicator<F>
where
    C: Context,
    F: Fn(&Document, &mut C, &C::Record) -> Result<(), MappingError>,
{
    fn apply_payload(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        (self.0)(document, ctx, record)
    }
}

/// Cloneable, shareable handle to any [`ApplyPayload`] implementation.
pub struct PayloadApplicator<C: Context> {
    inner: Arc<dyn ApplyPayload<C> + Send + Sync>,
}

impl<C: Context> Clone for PayloadApplicator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Context> fmt::Debug for PayloadApplicator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadApplicator").finish_non_exhaustive()
    }
}

impl<C: Context + 'static> PayloadApplicator<C> {
    pub fn from_map(map: PayloadMap<C>) -> Self {
        Self {
            inner: Arc::new(map),
        }
    }

    pub fn from_fn<F>(apply: F) -> Self
    where
        F: Fn(&Document, &mut C, &C::Record) -> Result<(), MappingError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FnApplicator(apply)),
        }
    }
}

impl<C: Context> PayloadApplicator<C> {
    pub fn apply(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        self.inner.apply_payload(document, ctx, record)
    }
}

impl<C: Context> ApplyPayload<C> for PayloadApplicator<C> {
    fn apply_payload(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        self.apply(document, ctx, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use serde_json::json;
    use store::{document_from_json, AttributeValue, MemoryContext, RecordId};

    #[test]
    fn maps_and_closures_share_one_interface() {
        let map = PayloadMap::<MemoryContext>::builder()
            .attribute("name", AttributeSchema::string("name"))
            .build();
        let from_map = PayloadApplicator::from_map(map);
        let from_fn = PayloadApplicator::from_fn(
            |_: &Document, ctx: &mut MemoryContext, record: &RecordId| {
                ctx.set_attribute(record, "touched", Some(AttributeValue::Bool(true)));
                Ok(())
            },
        );

        let mut ctx = MemoryContext::new();
        let record = ctx.create_record("Person").expect("create");
        let doc = document_from_json(json!({"name": "Ann"})).expect("object");

        for applicator in [from_map, from_fn.clone()] {
            applicator.apply(&doc, &mut ctx, &record).expect("applies");
        }

        assert_eq!(ctx.attribute(&record, "name"), Some(AttributeValue::from("Ann")));
        assert_eq!(ctx.attribute(&record, "touched"), Some(AttributeValue::Bool(true)));
    }
}
