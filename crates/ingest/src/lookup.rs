//! Identity-keyed lookup over already ingested records.
//!
//! Built once from the records an upsert returned (or any other set of
//! records of the same entity), then queried with raw payload documents:
//! lookups normalize the payload identity exactly as the ingester does.
use std::collections::HashMap;
use std::fmt;

use mapping::{Identity, IdentityMapping};
use store::{Context, Document, PayloadValue};
use tracing::error;

use crate::error::IngestError;
use crate::ingester::PayloadIngester;
use crate::metrics;

/// Maps normalized identities to records.
#[derive(Clone)]
pub struct IngestionLookup<R> {
    identity: IdentityMapping,
    index: HashMap<Identity, R>,
}

impl<R> fmt::Debug for IngestionLookup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionLookup")
            .field("identity_key", &self.identity.key())
            .field("len", &self.index.len())
            .finish()
    }
}

impl<R> IngestionLookup<R> {
    /// Indexes `records` by the stored value of the ingester's identity attribute.
    ///
    /// Fails with [`IngestError::NullIngestedIdentityAttribute`] when a record
    /// has no identity value.
    pub fn from_records<C, I>(
        ingester: &PayloadIngester<C>,
        ctx: &C,
        records: I,
    ) -> Result<Self, IngestError>
    where
        C: Context<Record = R>,
        I: IntoIterator<Item = R>,
    {
        let attribute = &ingester.identity_attribute().name;
        let records = records.into_iter();
        let mut index = HashMap::with_capacity(records.size_hint().0);
        for record in records {
            let value = ctx.attribute(&record, attribute).ok_or_else(|| {
                IngestError::NullIngestedIdentityAttribute {
                    attribute: attribute.clone(),
                }
            })?;
            index.insert(Identity::from(&value), record);
        }
        Ok(Self::from_index(ingester.identity().clone(), index))
    }

    pub fn from_index(identity: IdentityMapping, index: HashMap<Identity, R>) -> Self {
        Self { identity, index }
    }

    /// Payload key the lookup reads identities from.
    pub fn identity_key(&self) -> &str {
        self.identity.key()
    }

    /// Record whose identity matches the document's identity value.
    pub fn get(&self, document: &Document) -> Option<&R> {
        self.get_value(document.get(self.identity.key())?)
    }

    /// Like [`get`](Self::get) for an already extracted raw identity value.
    pub fn get_value(&self, value: &PayloadValue) -> Option<&R> {
        match self.identity.normalize(Some(value)) {
            Ok(Some(normalized)) => self.index.get(&normalized.identity),
            Ok(None) => None,
            Err(err) => {
                error!(
                    identity_key = %self.identity.key(),
                    error = %err,
                    "lookup_identity_failure"
                );
                metrics::record_lookup_failure(self.identity.key());
                None
            }
        }
    }

    pub fn get_identity(&self, identity: &Identity) -> Option<&R> {
        self.index.get(identity)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
