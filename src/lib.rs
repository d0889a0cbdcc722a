//! Workspace umbrella crate for the payload mapping and ingestion engine.
//!
//! This crate stitches together the value model, payload mapping, and batched
//! ingestion so callers can load entity definitions from YAML and upsert
//! payloads with a single API entry point.

pub mod config;

pub use ingest::{
    IngestError, IngestMetrics, IngestOptions, IngestResult, IngestStats, IngestionLookup,
    PayloadIngester, set_ingest_metrics,
};
pub use mapping::{
    ApplyPayload, AttributeMap, AttributeSchema, BoxError, CustomMap, Identity, IdentityMapping,
    MapNode, MappingError, NormalizedIdentity, PayloadApplicator, PayloadMap, PayloadMapBuilder,
    ScalarKind, ScalarMap, TransformChain, TransformError, ValueTransform, coerce,
};
pub use store::{
    AttributeValue, Context, Document, FetchRequest, MemoryContext, PayloadValue, RecordId,
    StoreError, document_from_json, documents_from_json,
};

pub use crate::config::{ConfigLoadError, EngineConfig, EntityConfig};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use tracing::debug;

/// Errors that can occur while routing payloads through an [`Engine`].
#[derive(Debug, Clone)]
pub enum EngineError {
    UnknownEntity(String),
    Ingest(IngestError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownEntity(name) => write!(f, "no ingester configured for `{name}`"),
            EngineError::Ingest(err) => write!(f, "ingest failure: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Ingest(err) => Some(err),
            EngineError::UnknownEntity(_) => None,
        }
    }
}

impl From<IngestError> for EngineError {
    fn from(value: IngestError) -> Self {
        EngineError::Ingest(value)
    }
}

struct Entry<C: Context> {
    ingester: PayloadIngester<C>,
    options: IngestOptions,
}

/// Ingesters and default options for every configured entity.
pub struct Engine<C: Context> {
    entries: BTreeMap<String, Entry<C>>,
}

impl<C: Context> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C: Context + 'static> Engine<C> {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigLoadError> {
        config.validate()?;
        let mut entries = BTreeMap::new();
        for entity in &config.entities {
            let entry = Entry {
                ingester: entity.ingester()?,
                options: entity.options()?,
            };
            entries.insert(entity.name.clone(), entry);
        }
        debug!(entities = entries.len(), "engine_configured");
        Ok(Self { entries })
    }
}

impl<C: Context> Engine<C> {
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn ingester(&self, entity: &str) -> Option<&PayloadIngester<C>> {
        self.entries.get(entity).map(|entry| &entry.ingester)
    }

    /// Default options configured for `entity`.
    pub fn options(&self, entity: &str) -> Option<&IngestOptions> {
        self.entries.get(entity).map(|entry| &entry.options)
    }

    /// Upsert documents with the entity's configured options.
    pub fn upsert(
        &self,
        ctx: &mut C,
        entity: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<C::Record>, EngineError> {
        let entry = self.entry(entity)?;
        Ok(entry.ingester.upsert(ctx, documents, &entry.options)?)
    }

    /// Upsert a JSON object or array of objects; non-object elements are skipped.
    pub fn upsert_json(
        &self,
        ctx: &mut C,
        entity: &str,
        payload: serde_json::Value,
    ) -> Result<Vec<C::Record>, EngineError> {
        self.upsert(ctx, entity, documents_from_json(payload))
    }

    /// Update documents with the entity's configured options.
    pub fn update(
        &self,
        ctx: &mut C,
        entity: &str,
        documents: Vec<Document>,
    ) -> Result<IngestResult<C::Record>, EngineError> {
        let entry = self.entry(entity)?;
        Ok(entry.ingester.update(ctx, documents, &entry.options)?)
    }

    /// Identity lookup over records of `entity`.
    pub fn lookup<I>(
        &self,
        ctx: &C,
        entity: &str,
        records: I,
    ) -> Result<IngestionLookup<C::Record>, EngineError>
    where
        I: IntoIterator<Item = C::Record>,
    {
        let entry = self.entry(entity)?;
        Ok(IngestionLookup::from_records(&entry.ingester, ctx, records)?)
    }

    fn entry(&self, entity: &str) -> Result<&Entry<C>, EngineError> {
        self.entries
            .get(entity)
            .ok_or_else(|| EngineError::UnknownEntity(entity.to_string()))
    }
}
