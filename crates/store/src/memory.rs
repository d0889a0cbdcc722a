//! In-memory [`Context`] used by tests, benchmarks, and demos.
use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::context::{Context, FetchRequest};
use crate::error::StoreError;
use crate::value::AttributeValue;

/// Handle to a record stored in a [`MemoryContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct MemoryRow {
    entity: String,
    attributes: BTreeMap<String, AttributeValue>,
}

/// A `BTreeMap`-backed record store.
///
/// Records come back from [`fetch`](Context::fetch) in creation order. The
/// context also counts attribute writes so callers can assert that a
/// re-ingest left records untouched.
#[derive(Debug, Default)]
pub struct MemoryContext {
    next_id: u64,
    rows: BTreeMap<RecordId, MemoryRow>,
    writes: usize,
    fetches: usize,
    last_prefetch: Vec<String>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record without counting its attributes as writes.
    pub fn insert<I, K>(&mut self, entity: &str, attributes: I) -> RecordId
    where
        I: IntoIterator<Item = (K, AttributeValue)>,
        K: Into<String>,
    {
        let id = self.allocate(entity);
        if let Some(row) = self.rows.get_mut(&id) {
            row.attributes
                .extend(attributes.into_iter().map(|(k, v)| (k.into(), v)));
        }
        id
    }

    /// Every record of `entity`, in creation order.
    pub fn records(&self, entity: &str) -> Vec<RecordId> {
        self.rows
            .iter()
            .filter(|(_, row)| row.entity == entity)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of attribute writes (including clears) since creation or the last reset.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn reset_write_count(&mut self) {
        self.writes = 0;
    }

    /// Number of fetches issued against this context.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    /// Prefetch paths requested by the most recent fetch.
    pub fn last_prefetch(&self) -> &[String] {
        &self.last_prefetch
    }

    fn allocate(&mut self, entity: &str) -> RecordId {
        self.next_id += 1;
        let id = RecordId(self.next_id);
        self.rows.insert(
            id,
            MemoryRow {
                entity: entity.to_string(),
                attributes: BTreeMap::new(),
            },
        );
        id
    }
}

impl Context for MemoryContext {
    type Record = RecordId;

    fn fetch(&mut self, request: &FetchRequest) -> Result<Vec<RecordId>, StoreError> {
        self.fetches += 1;
        self.last_prefetch = request.prefetch.clone();
        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| row.entity == request.entity)
            .filter(|(_, row)| request.matches(|name| row.attributes.get(name).cloned()))
            .map(|(id, _)| *id)
            .collect())
    }

    fn create_record(&mut self, entity: &str) -> Result<RecordId, StoreError> {
        Ok(self.allocate(entity))
    }

    fn attribute(&self, record: &RecordId, name: &str) -> Option<AttributeValue> {
        self.rows
            .get(record)
            .and_then(|row| row.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, record: &RecordId, name: &str, value: Option<AttributeValue>) {
        let Some(row) = self.rows.get_mut(record) else {
            warn!(record = %record, attribute = name, "set_attribute_unknown_record");
            return;
        };
        self.writes += 1;
        match value {
            Some(value) => {
                row.attributes.insert(name.to_string(), value);
            }
            None => {
                row.attributes.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_records_are_not_counted_as_writes() {
        let mut ctx = MemoryContext::new();
        let id = ctx.insert("Person", [("id", AttributeValue::from("1"))]);

        assert_eq!(ctx.write_count(), 0);
        assert_eq!(ctx.attribute(&id, "id"), Some(AttributeValue::from("1")));
    }

    #[test]
    fn fetch_filters_by_entity_and_keeps_creation_order() {
        let mut ctx = MemoryContext::new();
        let b = ctx.insert("Person", [("id", AttributeValue::from("b"))]);
        ctx.insert("Pet", [("id", AttributeValue::from("a"))]);
        let a = ctx.insert("Person", [("id", AttributeValue::from("a"))]);

        let request = FetchRequest::new("Person", "id", vec!["a".into(), "b".into()])
            .with_prefetch(vec!["pets".into()]);
        let found = ctx.fetch(&request).expect("fetch succeeds");

        assert_eq!(found, vec![b, a]);
        assert_eq!(ctx.fetch_count(), 1);
        assert_eq!(ctx.last_prefetch(), ["pets".to_string()]);
    }

    #[test]
    fn writes_and_clears_are_counted() {
        let mut ctx = MemoryContext::new();
        let id = ctx.create_record("Person").expect("create succeeds");

        ctx.set_attribute(&id, "name", Some("Ann".into()));
        ctx.set_attribute(&id, "name", None);

        assert_eq!(ctx.write_count(), 2);
        assert_eq!(ctx.attribute(&id, "name"), None);
        assert_eq!(ctx.records("Person"), vec![id]);
    }
}
