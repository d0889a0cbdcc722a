//! Error types produced by the ingest crate.
//!
//! # Error Categories
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`NullPayloadIdentityValue`](IngestError::NullPayloadIdentityValue) | Identity | A payload document has no identity value |
//! | [`NullIngestedIdentityAttribute`](IngestError::NullIngestedIdentityAttribute) | Identity | A persisted record has no identity attribute |
//! | [`OrderingFailed`](IngestError::OrderingFailed) | Identity | An input identity vanished between read and write |
//! | [`Mapping`](IngestError::Mapping) | Schema mapping | A field could not be mapped; carries the full key path |
//! | [`Store`](IngestError::Store) | Persistence | The context failed to fetch or create |
//!
//! Every variant raised by an ingester names it, so failures from
//! different entity types can be told apart in logs.
//!
//! # Pattern Matching
//!
//! ```rust
//! use ingest::IngestError;
//!
//! fn describe(error: &IngestError) -> String {
//!     match error {
//!         IngestError::Mapping { source, .. } => format!("bad field `{}`", source.path()),
//!         err if err.is_identity_error() => format!("identity mismatch: {err}"),
//!         err => err.to_string(),
//!     }
//! }
//! ```
use mapping::MappingError;
use store::StoreError;
use thiserror::Error;

/// Errors that abort an ingestion call.
///
/// Calls are fail-fast: records mapped before the failing one keep whatever
/// state the context holds for them; nothing is rolled back.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum IngestError {
    /// A payload document carries no (or a null) identity value.
    ///
    /// The whole batch fails; the offending document is not skipped.
    #[error("ingester `{ingester}`: payload identity `{key}` is null or missing")]
    NullPayloadIdentityValue { ingester: String, key: String },

    /// A persisted record has no value for the identity attribute.
    #[error("record has no value for identity attribute `{attribute}`")]
    NullIngestedIdentityAttribute { attribute: String },

    /// An input identity could not be found after upsert.
    ///
    /// Signals a non-deterministic identity transform, or an apply function
    /// that stored a different identity than the one the payload carried.
    #[error("ingester `{ingester}`: no record with identity {identity} after upsert")]
    OrderingFailed { ingester: String, identity: String },

    /// A payload field could not be mapped onto its record.
    #[error("ingester `{ingester}`: {source}")]
    Mapping {
        ingester: String,
        source: MappingError,
    },

    /// The persistence context failed.
    #[error("ingester `{ingester}`: {source}")]
    Store { ingester: String, source: StoreError },
}

impl IngestError {
    /// True for errors caused by a mismatch between the declared identity
    /// contract and the actual data.
    pub fn is_identity_error(&self) -> bool {
        matches!(
            self,
            IngestError::NullPayloadIdentityValue { .. }
                | IngestError::NullIngestedIdentityAttribute { .. }
                | IngestError::OrderingFailed { .. }
        )
    }

    /// Dotted key path of a mapping failure.
    pub fn path(&self) -> Option<&str> {
        match self {
            IngestError::Mapping { source, .. } => Some(source.path()),
            _ => None,
        }
    }
}
