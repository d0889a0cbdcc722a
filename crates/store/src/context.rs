//! The persistence-context boundary.
//!
//! A context is a transactional, single-threaded record store. The engine
//! only needs four capabilities from it: a filtered fetch, record creation,
//! and per-attribute read/write. Committing is the caller's business.
use crate::error::StoreError;
use crate::value::AttributeValue;

/// A confined, transactional record store.
///
/// `Record` is a handle: cloning it must not copy the underlying row, and
/// writes made through [`set_attribute`](Context::set_attribute) must be
/// visible to later reads through the same context.
pub trait Context {
    type Record: Clone;

    /// Fetch every record matching `request`, in the store's natural order.
    fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<Self::Record>, StoreError>;

    /// Create an empty record of the given entity.
    fn create_record(&mut self, entity: &str) -> Result<Self::Record, StoreError>;

    /// Current value of an attribute; `None` means absent.
    fn attribute(&self, record: &Self::Record, name: &str) -> Option<AttributeValue>;

    /// Overwrite (or clear, with `None`) an attribute.
    fn set_attribute(&mut self, record: &Self::Record, name: &str, value: Option<AttributeValue>);
}

/// Filter handed to [`Context::fetch`]: identity-in-set AND every scope equality.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub entity: String,
    pub identity_attribute: String,
    pub identities: Vec<AttributeValue>,
    pub scope: Vec<(String, AttributeValue)>,
    /// Relationship paths the caller wants eagerly loaded.
    pub prefetch: Vec<String>,
}

impl FetchRequest {
    pub fn new(
        entity: impl Into<String>,
        identity_attribute: impl Into<String>,
        identities: Vec<AttributeValue>,
    ) -> Self {
        Self {
            entity: entity.into(),
            identity_attribute: identity_attribute.into(),
            identities,
            scope: Vec::new(),
            prefetch: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Vec<(String, AttributeValue)>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_prefetch(mut self, prefetch: Vec<String>) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Evaluates the filter against a record exposed through `read`.
    ///
    /// Contexts without a native query language can call this per candidate.
    pub fn matches<F>(&self, read: F) -> bool
    where
        F: Fn(&str) -> Option<AttributeValue>,
    {
        let Some(identity) = read(&self.identity_attribute) else {
            return false;
        };
        if !self.identities.contains(&identity) {
            return false;
        }
        self.scope
            .iter()
            .all(|(name, expected)| read(name).as_ref() == Some(expected))
    }
}
