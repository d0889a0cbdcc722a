//! Per-call options for ingester operations.
//!
//! [`IngestOptions`] narrows which existing records are eligible for
//! matching (scope), asks the context to eagerly load relationships
//! (prefetch), and controls result ordering.
//!
//! # Example
//!
//! ```rust
//! use ingest::IngestOptions;
//! use store::AttributeValue;
//!
//! let options = IngestOptions::default()
//!     .scoped("tenant", AttributeValue::from("acme"))
//!     .prefetching("friends")
//!     .ordered(true);
//!
//! assert_eq!(options.scope.len(), 1);
//! assert!(options.stamp_scope);
//! ```
use store::AttributeValue;

/// Options shared by `update` and `upsert`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    /// Extra equality constraints every matched record must satisfy.
    ///
    /// Default: empty
    pub scope: Vec<(String, AttributeValue)>,

    /// Relationship paths the context should load with the fetched records.
    ///
    /// Default: empty
    pub prefetch: Vec<String>,

    /// Return upserted records in the order of the input documents.
    ///
    /// Default: `false`
    pub ordered: bool,

    /// Write the scope values onto newly created records before mapping.
    ///
    /// Default: `true`
    pub stamp_scope: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            scope: Vec::new(),
            prefetch: Vec::new(),
            ordered: false,
            stamp_scope: true,
        }
    }
}

impl IngestOptions {
    pub fn scoped(mut self, attribute: impl Into<String>, value: AttributeValue) -> Self {
        self.scope.push((attribute.into(), value));
        self
    }

    pub fn prefetching(mut self, path: impl Into<String>) -> Self {
        self.prefetch.push(path.into());
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn stamp_scope(mut self, stamp_scope: bool) -> Self {
        self.stamp_scope = stamp_scope;
        self
    }
}
