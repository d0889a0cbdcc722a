//! Batched update and upsert of payload documents into a persistence context.
//!
//! An ingester owns the identity contract of one entity type: which payload
//! key identifies a document, and which persisted attribute identifies a
//! record. Every call resolves all matching records with a single fetch,
//! applies each document to its counterpart, and (for upsert) creates records
//! for whatever did not match.
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use mapping::{
    ApplyPayload, AttributeSchema, Identity, IdentityMapping, MappingError, NormalizedIdentity,
    PayloadApplicator, PayloadMap,
};
use store::{AttributeValue, Context, Document, FetchRequest, StoreError};
use tracing::{debug, info, warn, Level};

use crate::error::IngestError;
use crate::metrics::{IngestStats, MetricsSpan};
use crate::options::IngestOptions;

/// Outcome of an update: records that matched, and documents that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestResult<R> {
    /// Matched records, in the order the context returned them.
    pub updated: Vec<R>,
    /// Unmatched documents, in first-seen input order.
    pub remainder: Vec<Document>,
}

/// Documents of one call, collapsed by identity.
struct Batch {
    /// Distinct identities in first-seen order.
    order: Vec<Identity>,
    /// Typed identity values for the fetch, parallel to `order`.
    values: Vec<AttributeValue>,
    /// Last document seen for each identity.
    documents: HashMap<Identity, Document>,
    /// Identity of every input document, duplicates included.
    input: Vec<Identity>,
}

/// Reusable update/upsert driver for one entity type.
///
/// Ingesters are immutable after construction and share their applicator,
/// so cloning one is cheap.
pub struct PayloadIngester<C: Context> {
    name: String,
    identity: IdentityMapping,
    applicator: PayloadApplicator<C>,
}

impl<C: Context> Clone for PayloadIngester<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            identity: self.identity.clone(),
            applicator: self.applicator.clone(),
        }
    }
}

impl<C: Context> fmt::Debug for PayloadIngester<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadIngester")
            .field("name", &self.name)
            .field("identity_key", &self.identity.key())
            .field("identity_attribute", &self.identity.attribute().name)
            .finish_non_exhaustive()
    }
}

impl<C: Context + 'static> PayloadIngester<C> {
    /// Builds an ingester for entity `name` from an identified payload map.
    ///
    /// # Panics
    ///
    /// If `map` has no identity mapping.
    pub fn new(name: impl Into<String>, map: PayloadMap<C>) -> Self {
        let name = name.into();
        let identity = match map.identity() {
            Some(identity) => identity.clone(),
            None => panic!("ingester `{name}` requires a payload map with an identity mapping"),
        };
        Self::with_applicator(name, identity, PayloadApplicator::from_map(map))
    }
}

impl<C: Context> PayloadIngester<C> {
    /// Builds an ingester around an arbitrary applicator.
    pub fn with_applicator(
        name: impl Into<String>,
        identity: IdentityMapping,
        applicator: PayloadApplicator<C>,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            applicator,
        }
    }

    /// Entity name records are fetched and created under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &IdentityMapping {
        &self.identity
    }

    pub fn identity_key(&self) -> &str {
        self.identity.key()
    }

    pub fn identity_attribute(&self) -> &AttributeSchema {
        self.identity.attribute()
    }

    pub fn applicator(&self) -> &PayloadApplicator<C> {
        &self.applicator
    }

    /// Normalized identity of a payload document.
    pub fn identity_of(&self, document: &Document) -> Result<NormalizedIdentity, IngestError> {
        match self.identity.extract(document) {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(IngestError::NullPayloadIdentityValue {
                ingester: self.name.clone(),
                key: self.identity.key().to_string(),
            }),
            Err(err) => Err(self.mapping_error(err)),
        }
    }

    /// Applies documents to the existing records they identify.
    pub fn update(
        &self,
        ctx: &mut C,
        documents: Vec<Document>,
        options: &IngestOptions,
    ) -> Result<IngestResult<C::Record>, IngestError> {
        self.update_with(ctx, documents, options, &self.applicator)
    }

    /// [`update`](Self::update) with a caller-supplied apply function.
    pub fn update_with(
        &self,
        ctx: &mut C,
        documents: Vec<Document>,
        options: &IngestOptions,
        apply: &dyn ApplyPayload<C>,
    ) -> Result<IngestResult<C::Record>, IngestError> {
        let start = Instant::now();
        let count = documents.len();
        let span = tracing::span!(
            Level::INFO,
            "ingest.update",
            ingester = %self.name,
            documents = count
        );
        let _guard = span.enter();
        let metrics = MetricsSpan::start();

        let result = self.batch(documents).and_then(|batch| {
            let existing = self.fetch(ctx, &batch, options)?;
            let (result, _) = self.reconcile(ctx, existing, batch, apply)?;
            Ok(result)
        });

        let result = result.map(|result| {
            let stats = IngestStats {
                documents: count,
                updated: result.updated.len(),
                inserted: 0,
            };
            (result, stats)
        });
        self.finish("update", start, metrics, result)
    }

    /// Applies documents to caller-supplied candidate records, skipping the fetch.
    ///
    /// Candidates whose identity is not in the batch are left untouched.
    pub fn update_records(
        &self,
        ctx: &mut C,
        records: Vec<C::Record>,
        documents: Vec<Document>,
    ) -> Result<IngestResult<C::Record>, IngestError> {
        self.update_records_with(ctx, records, documents, &self.applicator)
    }

    pub fn update_records_with(
        &self,
        ctx: &mut C,
        records: Vec<C::Record>,
        documents: Vec<Document>,
        apply: &dyn ApplyPayload<C>,
    ) -> Result<IngestResult<C::Record>, IngestError> {
        let start = Instant::now();
        let count = documents.len();
        let span = tracing::span!(
            Level::INFO,
            "ingest.update",
            ingester = %self.name,
            documents = count,
            candidates = records.len()
        );
        let _guard = span.enter();
        let metrics = MetricsSpan::start();

        let result = self
            .batch(documents)
            .and_then(|batch| self.reconcile(ctx, records, batch, apply))
            .map(|(result, _)| {
                let stats = IngestStats {
                    documents: count,
                    updated: result.updated.len(),
                    inserted: 0,
                };
                (result, stats)
            });
        self.finish("update", start, metrics, result)
    }

    /// Updates matching records and creates records for the rest.
    ///
    /// Returns updated records (fetch order) followed by inserted records
    /// (first-seen input order), or one record per input document in input
    /// order when [`IngestOptions::ordered`] is set.
    pub fn upsert(
        &self,
        ctx: &mut C,
        documents: Vec<Document>,
        options: &IngestOptions,
    ) -> Result<Vec<C::Record>, IngestError> {
        self.upsert_with(ctx, documents, options, &self.applicator)
    }

    /// [`upsert`](Self::upsert) with a caller-supplied apply function.
    pub fn upsert_with(
        &self,
        ctx: &mut C,
        documents: Vec<Document>,
        options: &IngestOptions,
        apply: &dyn ApplyPayload<C>,
    ) -> Result<Vec<C::Record>, IngestError> {
        let start = Instant::now();
        let count = documents.len();
        let span = tracing::span!(
            Level::INFO,
            "ingest.upsert",
            ingester = %self.name,
            documents = count,
            ordered = options.ordered
        );
        let _guard = span.enter();
        let metrics = MetricsSpan::start();

        let result = self.upsert_inner(ctx, documents, options, apply);
        self.finish("upsert", start, metrics, result)
    }

    /// Upserts a single document.
    pub fn upsert_one(
        &self,
        ctx: &mut C,
        document: Document,
        options: &IngestOptions,
    ) -> Result<C::Record, IngestError> {
        let mut records = self.upsert(ctx, vec![document], options)?;
        match records.pop() {
            Some(record) => Ok(record),
            // a one-document batch always yields exactly one record
            None => unreachable!("upsert of one document returned no record"),
        }
    }

    fn upsert_inner(
        &self,
        ctx: &mut C,
        documents: Vec<Document>,
        options: &IngestOptions,
        apply: &dyn ApplyPayload<C>,
    ) -> Result<(Vec<C::Record>, IngestStats), IngestError> {
        let count = documents.len();
        let batch = self.batch(documents)?;
        let existing = self.fetch(ctx, &batch, options)?;
        let (IngestResult { updated, remainder }, input) =
            self.reconcile(ctx, existing, batch, apply)?;

        let stats = IngestStats {
            documents: count,
            updated: updated.len(),
            inserted: remainder.len(),
        };
        let mut records = updated;
        records.reserve(remainder.len());
        for document in remainder {
            let record = ctx
                .create_record(&self.name)
                .map_err(|err| self.store_error(err))?;
            if options.stamp_scope {
                for (attribute, value) in &options.scope {
                    ctx.set_attribute(&record, attribute, Some(value.clone()));
                }
            }
            apply
                .apply_payload(&document, ctx, &record)
                .map_err(|err| self.mapping_error(err))?;
            records.push(record);
        }

        if options.ordered {
            records = self.restore_order(ctx, records, &input)?;
        }
        Ok((records, stats))
    }

    fn batch(&self, documents: Vec<Document>) -> Result<Batch, IngestError> {
        let mut batch = Batch {
            order: Vec::with_capacity(documents.len()),
            values: Vec::with_capacity(documents.len()),
            documents: HashMap::with_capacity(documents.len()),
            input: Vec::with_capacity(documents.len()),
        };
        for document in documents {
            let NormalizedIdentity { value, identity } = self.identity_of(&document)?;
            batch.input.push(identity.clone());
            if batch.documents.insert(identity.clone(), document).is_some() {
                debug!(identity = %identity, "duplicate_identity_replaced");
                continue;
            }
            batch.order.push(identity);
            batch.values.push(value);
        }
        Ok(batch)
    }

    fn fetch(
        &self,
        ctx: &mut C,
        batch: &Batch,
        options: &IngestOptions,
    ) -> Result<Vec<C::Record>, IngestError> {
        if batch.values.is_empty() {
            return Ok(Vec::new());
        }
        let request = FetchRequest::new(
            self.name.clone(),
            self.identity.attribute().name.clone(),
            batch.values.clone(),
        )
        .with_scope(options.scope.clone())
        .with_prefetch(options.prefetch.clone());
        ctx.fetch(&request).map_err(|err| self.store_error(err))
    }

    /// Pairs candidates with batch documents one-to-one and applies each pair.
    ///
    /// Also hands back the per-input identities for ordering.
    fn reconcile(
        &self,
        ctx: &mut C,
        candidates: Vec<C::Record>,
        batch: Batch,
        apply: &dyn ApplyPayload<C>,
    ) -> Result<(IngestResult<C::Record>, Vec<Identity>), IngestError> {
        let Batch {
            order,
            mut documents,
            input,
            ..
        } = batch;

        let mut updated = Vec::with_capacity(candidates.len().min(documents.len()));
        for record in candidates {
            let identity = self.record_identity(ctx, &record)?;
            let Some(document) = documents.remove(&identity) else {
                continue;
            };
            apply
                .apply_payload(&document, ctx, &record)
                .map_err(|err| self.mapping_error(err))?;
            updated.push(record);
        }

        let remainder = order
            .iter()
            .filter_map(|identity| documents.remove(identity))
            .collect();
        Ok((IngestResult { updated, remainder }, input))
    }

    fn restore_order(
        &self,
        ctx: &C,
        records: Vec<C::Record>,
        input: &[Identity],
    ) -> Result<Vec<C::Record>, IngestError> {
        let attribute = self.identity.attribute().name.as_str();
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            if let Some(value) = ctx.attribute(&record, attribute) {
                index.insert(Identity::from(&value), record);
            }
        }

        input
            .iter()
            .map(|identity| {
                index
                    .get(identity)
                    .cloned()
                    .ok_or_else(|| IngestError::OrderingFailed {
                        ingester: self.name.clone(),
                        identity: identity.to_string(),
                    })
            })
            .collect()
    }

    fn record_identity(&self, ctx: &C, record: &C::Record) -> Result<Identity, IngestError> {
        let attribute = &self.identity.attribute().name;
        ctx.attribute(record, attribute)
            .map(|value| Identity::from(&value))
            .ok_or_else(|| IngestError::NullIngestedIdentityAttribute {
                attribute: attribute.clone(),
            })
    }

    fn finish<T>(
        &self,
        operation: &str,
        start: Instant,
        metrics: Option<MetricsSpan>,
        result: Result<(T, IngestStats), IngestError>,
    ) -> Result<T, IngestError> {
        let elapsed_micros = start.elapsed().as_micros();
        match result {
            Ok((value, stats)) => {
                info!(
                    operation,
                    documents = stats.documents,
                    updated = stats.updated,
                    inserted = stats.inserted,
                    elapsed_micros,
                    "ingest_success"
                );
                if let Some(metrics) = metrics {
                    metrics.record(&self.name, Ok(stats));
                }
                Ok(value)
            }
            Err(err) => {
                warn!(
                    operation,
                    error = %err,
                    path = err.path().unwrap_or(""),
                    elapsed_micros,
                    "ingest_failure"
                );
                if let Some(metrics) = metrics {
                    metrics.record(&self.name, Err(&err));
                }
                Err(err)
            }
        }
    }

    fn mapping_error(&self, source: MappingError) -> IngestError {
        IngestError::Mapping {
            ingester: self.name.clone(),
            source,
        }
    }

    fn store_error(&self, source: StoreError) -> IngestError {
        IngestError::Store {
            ingester: self.name.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping::{TransformChain, ValueTransform};
    use serde_json::{json, Value};
    use store::{document_from_json, documents_from_json, MemoryContext, RecordId};

    fn person_map() -> PayloadMap<MemoryContext> {
        PayloadMap::identified_by("id", AttributeSchema::string("id"))
            .attribute("name", AttributeSchema::string("name").optional())
            .attribute("profile.age", AttributeSchema::integer32("age").optional())
            .build()
    }

    fn ingester() -> PayloadIngester<MemoryContext> {
        PayloadIngester::new("Person", person_map())
    }

    fn docs(value: Value) -> Vec<Document> {
        documents_from_json(value)
    }

    fn id_of(ctx: &MemoryContext, record: &RecordId) -> Option<AttributeValue> {
        ctx.attribute(record, "id")
    }

    #[test]
    #[should_panic(expected = "requires a payload map with an identity mapping")]
    fn new_requires_identity_mapping() {
        let map = PayloadMap::<MemoryContext>::builder()
            .attribute("name", AttributeSchema::string("name"))
            .build();
        let _ = PayloadIngester::new("Person", map);
    }

    #[test]
    fn accessors_expose_identity_contract() {
        let ingester = ingester();
        assert_eq!(ingester.name(), "Person");
        assert_eq!(ingester.identity_key(), "id");
        assert_eq!(ingester.identity_attribute().name, "id");

        let doc = document_from_json(json!({"id": " 1 "})).expect("object");
        let identity = ingester.identity_of(&doc).expect("identity");
        assert_eq!(identity.value, AttributeValue::from(" 1 "));
    }

    #[test]
    fn update_partitions_matched_and_unmatched_documents() {
        let mut ctx = MemoryContext::new();
        let existing = ctx.insert("Person", [("id", AttributeValue::from("1"))]);

        let result = ingester()
            .update(
                &mut ctx,
                docs(json!([{"id": "1", "name": "Ann"}, {"id": "2", "name": "Bob"}])),
                &IngestOptions::default(),
            )
            .expect("update succeeds");

        assert_eq!(result.updated, vec![existing]);
        assert_eq!(result.remainder.len(), 1);
        assert_eq!(
            result.remainder[0].get("id").and_then(|v| v.as_str()),
            Some("2")
        );
        assert_eq!(ctx.attribute(&existing, "name"), Some("Ann".into()));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.fetch_count(), 1);
    }

    #[test]
    fn upsert_inserts_remainder_after_updates() {
        let mut ctx = MemoryContext::new();
        let existing = ctx.insert("Person", [("id", AttributeValue::from("2"))]);

        let records = ingester()
            .upsert(
                &mut ctx,
                docs(json!([{"id": "3"}, {"id": "2"}, {"id": "1"}])),
                &IngestOptions::default(),
            )
            .expect("upsert succeeds");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], existing);
        let ids: Vec<_> = records[1..].iter().map(|r| id_of(&ctx, r)).collect();
        assert_eq!(ids, vec![Some("3".into()), Some("1".into())]);
        assert_eq!(ctx.records("Person").len(), 3);
    }

    #[test]
    fn ordered_upsert_follows_input_order() {
        let mut ctx = MemoryContext::new();
        ctx.insert("Person", [("id", AttributeValue::from("1"))]);
        ctx.insert("Person", [("id", AttributeValue::from("2"))]);

        let records = ingester()
            .upsert(
                &mut ctx,
                docs(json!([{"id": "3"}, {"id": "1"}, {"id": "2"}])),
                &IngestOptions::default().ordered(true),
            )
            .expect("upsert succeeds");

        let ids: Vec<_> = records.iter().map(|r| id_of(&ctx, r)).collect();
        assert_eq!(
            ids,
            vec![Some("3".into()), Some("1".into()), Some("2".into())]
        );
    }

    #[test]
    fn duplicate_identities_collapse_to_last_document() {
        let mut ctx = MemoryContext::new();

        let records = ingester()
            .upsert(
                &mut ctx,
                docs(json!([
                    {"id": "1", "name": "first"},
                    {"id": "2"},
                    {"id": "1", "name": "last"}
                ])),
                &IngestOptions::default(),
            )
            .expect("upsert succeeds");

        assert_eq!(records.len(), 2);
        assert_eq!(id_of(&ctx, &records[0]), Some("1".into()));
        assert_eq!(ctx.attribute(&records[0], "name"), Some("last".into()));
        assert_eq!(id_of(&ctx, &records[1]), Some("2".into()));
    }

    #[test]
    fn ordered_upsert_repeats_records_for_duplicate_inputs() {
        let mut ctx = MemoryContext::new();

        let records = ingester()
            .upsert(
                &mut ctx,
                docs(json!([{"id": "1"}, {"id": "2"}, {"id": "1"}])),
                &IngestOptions::default().ordered(true),
            )
            .expect("upsert succeeds");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], records[2]);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn scope_restricts_matches_and_is_stamped_on_inserts() {
        let mut ctx = MemoryContext::new();
        let other_tenant = ctx.insert(
            "Person",
            [
                ("id", AttributeValue::from("1")),
                ("tenant", AttributeValue::from("globex")),
            ],
        );
        let options = IngestOptions::default().scoped("tenant", "acme".into());

        let records = ingester()
            .upsert(&mut ctx, docs(json!([{"id": "1", "name": "Ann"}])), &options)
            .expect("upsert succeeds");

        assert_eq!(records.len(), 1);
        assert_ne!(records[0], other_tenant);
        assert_eq!(ctx.attribute(&records[0], "tenant"), Some("acme".into()));
        assert_eq!(ctx.attribute(&other_tenant, "name"), None);
    }

    #[test]
    fn scope_stamping_can_be_disabled() {
        let mut ctx = MemoryContext::new();
        let options = IngestOptions::default()
            .scoped("tenant", "acme".into())
            .stamp_scope(false);

        let records = ingester()
            .upsert(&mut ctx, docs(json!([{"id": "1"}])), &options)
            .expect("upsert succeeds");

        assert_eq!(ctx.attribute(&records[0], "tenant"), None);
    }

    #[test]
    fn prefetch_paths_reach_the_context() {
        let mut ctx = MemoryContext::new();
        let options = IngestOptions::default().prefetching("friends");

        ingester()
            .update(&mut ctx, docs(json!([{"id": "1"}])), &options)
            .expect("update succeeds");

        assert_eq!(ctx.last_prefetch(), ["friends".to_string()]);
    }

    #[test]
    fn empty_batch_skips_the_fetch() {
        let mut ctx = MemoryContext::new();

        let records = ingester()
            .upsert(&mut ctx, Vec::new(), &IngestOptions::default().ordered(true))
            .expect("upsert succeeds");

        assert!(records.is_empty());
        assert_eq!(ctx.fetch_count(), 0);
    }

    #[test]
    fn null_identity_fails_the_whole_batch() {
        let mut ctx = MemoryContext::new();

        let err = ingester()
            .upsert(
                &mut ctx,
                docs(json!([{"id": "1"}, {"id": null}])),
                &IngestOptions::default(),
            )
            .expect_err("null identity is rejected");

        assert!(matches!(
            err,
            IngestError::NullPayloadIdentityValue { ref ingester, ref key }
                if ingester == "Person" && key == "id"
        ));
        assert!(ctx.is_empty());
        assert_eq!(ctx.fetch_count(), 0);
    }

    #[test]
    fn stored_record_without_identity_is_rejected() {
        let mut ctx = MemoryContext::new();
        let orphan = ctx.create_record("Person").expect("create");

        let err = ingester()
            .update_records(&mut ctx, vec![orphan], docs(json!([{"id": "1"}])))
            .expect_err("record without identity is rejected");

        assert!(matches!(
            err,
            IngestError::NullIngestedIdentityAttribute { ref attribute } if attribute == "id"
        ));
    }

    #[test]
    fn mapping_failures_carry_ingester_name_and_path() {
        let mut ctx = MemoryContext::new();
        ctx.insert("Person", [("id", AttributeValue::from("1"))]);

        let err = ingester()
            .upsert(
                &mut ctx,
                docs(json!([{"id": "1", "profile": {"age": "old"}}])),
                &IngestOptions::default(),
            )
            .expect_err("bad age fails");

        assert_eq!(err.path(), Some("profile.age"));
        assert!(matches!(err, IngestError::Mapping { ref ingester, .. } if ingester == "Person"));
    }

    #[test]
    fn mapping_failure_aborts_without_rollback() {
        let mut ctx = MemoryContext::new();

        let err = ingester()
            .upsert(
                &mut ctx,
                docs(json!([
                    {"id": "1", "name": "Ann"},
                    {"id": "2", "profile": {"age": 1.5}}
                ])),
                &IngestOptions::default(),
            )
            .expect_err("second document fails");

        assert_eq!(err.path(), Some("profile.age"));
        let first = ctx.records("Person")[0];
        assert_eq!(ctx.attribute(&first, "name"), Some("Ann".into()));
    }

    #[test]
    fn update_records_only_touches_matching_candidates() {
        let mut ctx = MemoryContext::new();
        let one = ctx.insert("Person", [("id", AttributeValue::from("1"))]);
        let two = ctx.insert("Person", [("id", AttributeValue::from("2"))]);

        let result = ingester()
            .update_records(
                &mut ctx,
                vec![one, two],
                docs(json!([{"id": "2", "name": "Bob"}, {"id": "9"}])),
            )
            .expect("update succeeds");

        assert_eq!(result.updated, vec![two]);
        assert_eq!(result.remainder.len(), 1);
        assert_eq!(ctx.attribute(&one, "name"), None);
        assert_eq!(ctx.fetch_count(), 0);
    }

    #[test]
    fn apply_override_replaces_the_map_for_one_call() {
        let mut ctx = MemoryContext::new();
        let ingester = ingester();
        let stamp = PayloadApplicator::from_fn(
            |doc: &Document, ctx: &mut MemoryContext, record: &RecordId| {
                let id = doc.get("id").and_then(|v| v.as_str()).map(AttributeValue::from);
                ctx.set_attribute(record, "id", id);
                ctx.set_attribute(record, "source", Some("override".into()));
                Ok(())
            },
        );

        let records = ingester
            .upsert_with(
                &mut ctx,
                docs(json!([{"id": "1", "name": "ignored"}])),
                &IngestOptions::default().ordered(true),
                &stamp,
            )
            .expect("upsert succeeds");

        assert_eq!(ctx.attribute(&records[0], "source"), Some("override".into()));
        assert_eq!(ctx.attribute(&records[0], "name"), None);
    }

    #[test]
    fn ordering_fails_when_apply_drops_the_identity() {
        let mut ctx = MemoryContext::new();
        let forgetful = PayloadApplicator::from_fn(
            |_: &Document, _: &mut MemoryContext, _: &RecordId| Ok(()),
        );

        let err = ingester()
            .upsert_with(
                &mut ctx,
                docs(json!([{"id": "1"}])),
                &IngestOptions::default().ordered(true),
                &forgetful,
            )
            .expect_err("identity cannot be found");

        assert!(matches!(err, IngestError::OrderingFailed { ref identity, .. } if identity == "\"1\""));
        assert!(err.is_identity_error());
    }

    #[test]
    fn identity_transforms_apply_before_matching() {
        let map = PayloadMap::<MemoryContext>::identified_by_with(
            "id",
            TransformChain::new([ValueTransform::trim_strings()]),
            AttributeSchema::integer64("id"),
        )
        .build();
        let ingester = PayloadIngester::new("Person", map);
        let mut ctx = MemoryContext::new();
        let existing = ctx.insert("Person", [("id", AttributeValue::Int64(7))]);

        let records = ingester
            .upsert(
                &mut ctx,
                docs(json!([{"id": " 7 "}, {"id": 8}])),
                &IngestOptions::default().ordered(true),
            )
            .expect("upsert succeeds");

        assert_eq!(records[0], existing);
        assert_eq!(ctx.attribute(&records[1], "id"), Some(AttributeValue::Int64(8)));
    }

    #[test]
    fn reingesting_unchanged_documents_writes_nothing() {
        let mut ctx = MemoryContext::new();
        let ingester = ingester();
        let batch = docs(json!([
            {"id": "1", "name": "Ann", "profile": {"age": 30}},
            {"id": "2", "name": "Bob"}
        ]));

        let first = ingester
            .upsert(&mut ctx, batch.clone(), &IngestOptions::default())
            .expect("first upsert");
        ctx.reset_write_count();
        let second = ingester
            .upsert(&mut ctx, batch, &IngestOptions::default())
            .expect("second upsert");

        assert_eq!(first, second);
        assert_eq!(ctx.write_count(), 0);
    }

    #[test]
    fn upsert_one_returns_the_record() {
        let mut ctx = MemoryContext::new();
        let doc = document_from_json(json!({"id": "1"})).expect("object");

        let record = ingester()
            .upsert_one(&mut ctx, doc, &IngestOptions::default())
            .expect("upsert succeeds");

        assert_eq!(id_of(&ctx, &record), Some("1".into()));
    }
}
