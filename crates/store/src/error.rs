//! Error types produced by persistence contexts.
use thiserror::Error;

use crate::memory::RecordId;

/// Errors surfaced by a [`Context`](crate::Context) implementation.
///
/// The engine never retries or rolls back on these; it forwards them to the
/// caller wrapped with the ingester's name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// A record handle does not belong to this context.
    #[error("unknown record {0}")]
    UnknownRecord(RecordId),

    /// Backend-specific failure (I/O, query, constraint).
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}
