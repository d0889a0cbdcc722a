//! Payload Store Layer
//!
//! The value model and persistence boundary the ingestion engine is written
//! against. Nothing here knows about mappings: this crate only describes what
//! a payload looks like, what a persisted attribute looks like, and what a
//! record store must be able to do.
//!
//! ## What lives here
//!
//! - [`PayloadValue`] / [`Document`] - loosely-typed payload trees, convertible from `serde_json`
//! - [`AttributeValue`] - typed values stored on records
//! - [`Context`] / [`FetchRequest`] - the record-store boundary
//! - [`MemoryContext`] - a reference store that counts writes, for tests and demos
//!
//! ## Example
//!
//! ```
//! use store::{AttributeValue, Context, FetchRequest, MemoryContext};
//!
//! let mut ctx = MemoryContext::new();
//! ctx.insert("Person", [("id", AttributeValue::from("1"))]);
//!
//! let request = FetchRequest::new("Person", "id", vec![AttributeValue::from("1")]);
//! let found = ctx.fetch(&request).unwrap();
//! assert_eq!(found.len(), 1);
//! ```
mod context;
mod error;
mod memory;
mod value;

pub use crate::context::{Context, FetchRequest};
pub use crate::error::StoreError;
pub use crate::memory::{MemoryContext, RecordId};
pub use crate::value::{document_from_json, documents_from_json, AttributeValue, Document, PayloadValue};
