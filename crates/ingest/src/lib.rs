//! Payload Ingest Layer
//!
//! This is where payload documents become persisted records. We take a batch
//! of loosely-typed documents, match them against existing records by
//! identity, and apply a [`mapping::PayloadMap`] to each pair.
//!
//! ## What we do here
//!
//! - **Match by identity** - Every document is identified by one payload key,
//!   normalized the same way the record attribute is stored
//! - **Batch the reads** - One fetch per call resolves every candidate record,
//!   optionally narrowed by scope and with relationships prefetched
//! - **Update or upsert** - Matched documents update their record; with upsert,
//!   the rest become new records
//! - **Keep input order** - Ordered upserts return one record per input document
//! - **Look up later** - [`IngestionLookup`] finds ingested records from raw payloads
//! - **Log everything** - Structured logs via tracing, plus an optional metrics hook
//!
//! ## Main entry point
//!
//! Build a [`PayloadIngester`] from an identified payload map, then call
//! [`PayloadIngester::upsert`] with a context, documents, and [`IngestOptions`].
//!
//! ## Example
//!
//! ```
//! use ingest::{IngestOptions, PayloadIngester};
//! use mapping::{AttributeSchema, PayloadMap};
//! use store::{documents_from_json, AttributeValue, Context, MemoryContext};
//!
//! let map = PayloadMap::identified_by("id", AttributeSchema::string("id"))
//!     .attribute("name", AttributeSchema::string("name").optional())
//!     .build();
//! let people = PayloadIngester::new("Person", map);
//!
//! let mut ctx = MemoryContext::new();
//! let docs = documents_from_json(serde_json::json!([
//!     {"id": "2", "name": "Bob"},
//!     {"id": "1", "name": "Ann"},
//! ]));
//!
//! let records = people
//!     .upsert(&mut ctx, docs, &IngestOptions::default().ordered(true))
//!     .unwrap();
//!
//! assert_eq!(ctx.attribute(&records[0], "name"), Some(AttributeValue::from("Bob")));
//! ```
mod error;
mod ingester;
mod lookup;
mod metrics;
mod options;

pub use crate::error::IngestError;
pub use crate::ingester::{IngestResult, PayloadIngester};
pub use crate::lookup::IngestionLookup;
pub use crate::metrics::{set_ingest_metrics, IngestMetrics, IngestStats};
pub use crate::options::IngestOptions;
