//! The declarative mapping tree.
//!
//! A [`PayloadMap`] is built once, at schema-definition time, through a
//! [`PayloadMapBuilder`]. Building freezes the tree: a `PayloadMap` has no
//! mutators and can be shared by every ingestion call afterwards.
//!
//! # Example
//!
//! ```rust
//! use mapping::{AttributeSchema, PayloadMap};
//! use store::{document_from_json, AttributeValue, Context, MemoryContext};
//!
//! let map = PayloadMap::<MemoryContext>::identified_by("id", AttributeSchema::string("id"))
//!     .attribute("name", AttributeSchema::string("name"))
//!     .attribute("profile.age", AttributeSchema::integer32("age").optional())
//!     .build();
//!
//! let mut ctx = MemoryContext::new();
//! let record = ctx.create_record("Person").unwrap();
//! let doc = document_from_json(serde_json::json!({
//!     "id": "1",
//!     "name": "Ann",
//!     "profile": { "age": "30" },
//!     "unmodelled": true
//! }))
//! .unwrap();
//!
//! map.apply(&doc, &mut ctx, &record).unwrap();
//! assert_eq!(ctx.attribute(&record, "age"), Some(AttributeValue::Int32(30)));
//! ```
//!
//! # Construction faults
//!
//! Mis-declared maps are programmer errors and panic immediately:
//!
//! - registering any key path whose first component is the identity key
//! - registering a scalar where a nested map already lives, or the reverse
//! - an empty key path or path component
use std::collections::BTreeMap;
use std::fmt;

use store::{Context, Document, PayloadValue};

use crate::error::{BoxError, MappingError};
use crate::identity::IdentityMapping;
use crate::scalar::{AttributeMap, CustomMap, ScalarMap};
use crate::schema::AttributeSchema;
use crate::transform::TransformChain;

/// A child of a [`PayloadMap`] node.
pub enum MapNode<C: Context> {
    Leaf(ScalarMap<C>),
    Subtree(PayloadMap<C>),
}

impl<C: Context> Clone for MapNode<C> {
    fn clone(&self) -> Self {
        match self {
            MapNode::Leaf(leaf) => MapNode::Leaf(leaf.clone()),
            MapNode::Subtree(map) => MapNode::Subtree(map.clone()),
        }
    }
}

impl<C: Context> fmt::Debug for MapNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapNode::Leaf(leaf) => f.debug_tuple("Leaf").field(leaf).finish(),
            MapNode::Subtree(map) => f.debug_tuple("Subtree").field(map).finish(),
        }
    }
}

impl<C: Context> MapNode<C> {
    fn kind(&self) -> &'static str {
        match self {
            MapNode::Leaf(_) => "scalar",
            MapNode::Subtree(_) => "nested map",
        }
    }
}

/// Recursive tree of named scalar and nested mappings, with at most one
/// identity mapping fixed at construction.
pub struct PayloadMap<C: Context> {
    children: BTreeMap<String, MapNode<C>>,
    identity: Option<IdentityMapping>,
}

impl<C: Context> Clone for PayloadMap<C> {
    fn clone(&self) -> Self {
        Self {
            children: self.children.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<C: Context> fmt::Debug for PayloadMap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadMap")
            .field("identity", &self.identity)
            .field("children", &self.children)
            .finish()
    }
}

impl<C: Context> PayloadMap<C> {
    fn empty(identity: Option<IdentityMapping>) -> Self {
        Self {
            children: BTreeMap::new(),
            identity,
        }
    }

    /// Builder for a map without an identity (nested maps, grafted subtrees).
    pub fn builder() -> PayloadMapBuilder<C> {
        PayloadMapBuilder {
            root: Self::empty(None),
        }
    }

    /// Builder for a map identified by `key`, stored in `attribute`.
    pub fn identified_by(key: &str, attribute: AttributeSchema) -> PayloadMapBuilder<C> {
        Self::identified_by_with(key, TransformChain::default(), attribute)
    }

    pub fn identified_by_with(
        key: &str,
        transforms: TransformChain,
        attribute: AttributeSchema,
    ) -> PayloadMapBuilder<C> {
        assert!(
            !key.is_empty() && !key.contains('.'),
            "identity key `{key}` must be a single non-empty key"
        );
        let identity = IdentityMapping::new(key, AttributeMap::with_transforms(transforms, attribute));
        PayloadMapBuilder {
            root: Self::empty(Some(identity)),
        }
    }

    /// Builder for a map whose identity key is the attribute's own name.
    pub fn identified_by_attribute(attribute: AttributeSchema) -> PayloadMapBuilder<C> {
        let key = attribute.name.clone();
        Self::identified_by(&key, attribute)
    }

    /// Builds an identified map in one go, registering children in `prepare`.
    pub fn prepare<F>(
        key: &str,
        transforms: TransformChain,
        attribute: AttributeSchema,
        prepare: F,
    ) -> Self
    where
        F: FnOnce(PayloadMapBuilder<C>) -> PayloadMapBuilder<C>,
    {
        prepare(Self::identified_by_with(key, transforms, attribute)).build()
    }

    pub fn identity(&self) -> Option<&IdentityMapping> {
        self.identity.as_ref()
    }

    /// Looks up the node registered at a dotted key path.
    pub fn get(&self, key_path: &str) -> Option<&MapNode<C>> {
        let mut components = key_path.split('.');
        let first = components.next()?;
        let mut node = self.children.get(first)?;
        for component in components {
            node = match node {
                MapNode::Subtree(map) => map.children.get(component)?,
                MapNode::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// Keys registered directly on this node, identity key excluded.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Applies `document` to `record`.
    ///
    /// Nested documents recurse into matching nested maps; scalar keys run
    /// their leaf; unmodelled keys are ignored. Failures carry the full
    /// dotted key path.
    pub fn apply(
        &self,
        document: &Document,
        ctx: &mut C,
        record: &C::Record,
    ) -> Result<(), MappingError> {
        for (key, value) in document {
            if let Some(identity) = &self.identity {
                if identity.key() == key {
                    identity
                        .map()
                        .apply_value(Some(value), ctx, record)
                        .map_err(|err| err.prefixed(key))?;
                    continue;
                }
            }

            match (self.children.get(key), value) {
                (Some(MapNode::Subtree(map)), PayloadValue::Document(nested)) => map
                    .apply(nested, ctx, record)
                    .map_err(|err| err.prefixed(key))?,
                (Some(MapNode::Leaf(leaf)), value) => leaf
                    .apply_value(Some(value), ctx, record)
                    .map_err(|err| err.prefixed(key))?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Mutable setup-phase view of a [`PayloadMap`]; consumed by [`build`](Self::build).
pub struct PayloadMapBuilder<C: Context> {
    root: PayloadMap<C>,
}

impl<C: Context> fmt::Debug for PayloadMapBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadMapBuilder").field(&self.root).finish()
    }
}

impl<C: Context> PayloadMapBuilder<C> {
    /// Maps the value at `key_path` onto `attribute`.
    pub fn attribute(self, key_path: &str, attribute: AttributeSchema) -> Self {
        self.attribute_with(key_path, TransformChain::default(), attribute)
    }

    pub fn attribute_with(
        mut self,
        key_path: &str,
        transforms: TransformChain,
        attribute: AttributeSchema,
    ) -> Self {
        let leaf = ScalarMap::Attribute(AttributeMap::with_transforms(transforms, attribute));
        self.insert(key_path, MapNode::Leaf(leaf));
        self
    }

    /// Hands the value at `key_path` to `write` instead of coercing it.
    pub fn custom<F>(self, key_path: &str, write: F) -> Self
    where
        F: Fn(&mut C, &C::Record, Option<&PayloadValue>) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.custom_with(key_path, TransformChain::default(), write)
    }

    pub fn custom_with<F>(mut self, key_path: &str, transforms: TransformChain, write: F) -> Self
    where
        F: Fn(&mut C, &C::Record, Option<&PayloadValue>) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        let leaf = ScalarMap::Custom(CustomMap::new(transforms, write));
        self.insert(key_path, MapNode::Leaf(leaf));
        self
    }

    /// Grafts an existing map at `key_path`, reusing its whole subtree.
    pub fn graft(mut self, key_path: &str, map: PayloadMap<C>) -> Self {
        self.insert(key_path, MapNode::Subtree(map));
        self
    }

    /// Maps every attribute under its own name, skipping the identity attribute.
    pub fn default_mappings(mut self, attributes: &[AttributeSchema]) -> Self {
        for attribute in attributes {
            if let Some(identity) = &self.root.identity {
                if attribute.name == identity.attribute().name || attribute.name == identity.key() {
                    continue;
                }
            }
            let key = attribute.name.clone();
            let leaf = ScalarMap::Attribute(AttributeMap::new(attribute.clone()));
            self.insert(&key, MapNode::Leaf(leaf));
        }
        self
    }

    pub fn build(self) -> PayloadMap<C> {
        self.root
    }

    fn insert(&mut self, key_path: &str, node: MapNode<C>) {
        let components: Vec<&str> = key_path.split('.').collect();
        assert!(
            components.iter().all(|component| !component.is_empty()),
            "invalid key path `{key_path}`"
        );
        let Some((last, parents)) = components.split_last() else {
            panic!("invalid key path `{key_path}`");
        };

        let mut current = &mut self.root;
        for (depth, component) in parents.iter().enumerate() {
            reject_identity_collision(current, component, key_path);
            let entry = current
                .children
                .entry((*component).to_string())
                .or_insert_with(|| MapNode::Subtree(PayloadMap::empty(None)));
            current = match entry {
                MapNode::Subtree(map) => map,
                MapNode::Leaf(_) => panic!(
                    "`{}` is already mapped as a scalar; cannot nest `{key_path}` under it",
                    components[..=depth].join(".")
                ),
            };
        }

        reject_identity_collision(current, last, key_path);
        match (current.children.get(*last), &node) {
            (None, _) | (Some(MapNode::Leaf(_)), MapNode::Leaf(_)) => {}
            (Some(existing), _) => panic!(
                "`{key_path}` is already mapped as a {}; cannot register a {} there",
                existing.kind(),
                node.kind()
            ),
        }
        current.children.insert((*last).to_string(), node);
    }
}

fn reject_identity_collision<C: Context>(node: &PayloadMap<C>, component: &str, key_path: &str) {
    if let Some(identity) = &node.identity {
        assert!(
            identity.key() != component,
            "key path `{key_path}` collides with identity key `{component}`; \
             identity is mapped once, at construction"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use store::{document_from_json, AttributeValue, MemoryContext, RecordId};

    type Map = PayloadMap<MemoryContext>;

    fn doc(value: serde_json::Value) -> Document {
        document_from_json(value).expect("object")
    }

    fn fresh(ctx: &mut MemoryContext) -> RecordId {
        ctx.create_record("Person").expect("create")
    }

    fn person_map() -> Map {
        Map::identified_by("id", AttributeSchema::string("id"))
            .attribute("name", AttributeSchema::string("name"))
            .attribute("age", AttributeSchema::integer32("age").optional())
            .build()
    }

    #[test]
    fn applies_scalars_and_identity() {
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        person_map()
            .apply(&doc(json!({"id": "1", "name": "Ann", "age": "30"})), &mut ctx, &record)
            .expect("maps");

        assert_eq!(ctx.attribute(&record, "id"), Some(AttributeValue::from("1")));
        assert_eq!(ctx.attribute(&record, "age"), Some(AttributeValue::Int32(30)));
    }

    #[test]
    fn second_application_performs_no_writes() {
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);
        let map = person_map();
        let payload = doc(json!({"id": "1", "name": "Ann", "age": "30"}));

        map.apply(&payload, &mut ctx, &record).expect("first");
        ctx.reset_write_count();
        map.apply(&payload, &mut ctx, &record).expect("second");

        assert_eq!(ctx.write_count(), 0);
    }

    #[test]
    fn unknown_keys_and_missing_keys_are_ignored() {
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        person_map()
            .apply(&doc(json!({"id": "1", "name": "Ann", "extra": [1, 2]})), &mut ctx, &record)
            .expect("extra keys are fine");

        assert_eq!(ctx.attribute(&record, "age"), None);
        assert_eq!(ctx.write_count(), 2);
    }

    #[test]
    fn dotted_paths_create_nested_maps() {
        let map = Map::builder()
            .attribute("author.profile.age", AttributeSchema::integer32("age"))
            .attribute("author.name", AttributeSchema::string("author_name"))
            .build();

        assert!(matches!(map.get("author"), Some(MapNode::Subtree(_))));
        assert!(matches!(map.get("author.profile.age"), Some(MapNode::Leaf(_))));
        assert!(map.get("author.profile.age.more").is_none());
        assert_eq!(map.keys().collect::<Vec<_>>(), ["author"]);
    }

    #[test]
    fn failures_carry_the_full_key_path_at_any_depth() {
        let cases = [
            ("c", json!({"c": "x"})),
            ("b.c", json!({"b": {"c": "x"}})),
            ("a.b.c", json!({"a": {"b": {"c": "x"}}})),
            ("w.a.b.c", json!({"w": {"a": {"b": {"c": "x"}}}})),
        ];

        for (path, payload) in cases {
            let map = Map::builder()
                .attribute(path, AttributeSchema::integer64("n"))
                .build();
            let mut ctx = MemoryContext::new();
            let record = fresh(&mut ctx);

            let err = map
                .apply(&doc(payload), &mut ctx, &record)
                .expect_err("not a number");
            assert_eq!(err.path(), path);
        }
    }

    #[test]
    fn custom_failures_are_prefixed_too() {
        let map = Map::builder()
            .custom("meta.flag", |_: &mut MemoryContext, _: &RecordId, _: Option<&PayloadValue>| {
                Err("nope".into())
            })
            .build();
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        let err = map
            .apply(&doc(json!({"meta": {"flag": 1}})), &mut ctx, &record)
            .expect_err("custom fails");
        assert!(matches!(err, MappingError::CustomMappingFailed { .. }));
        assert_eq!(err.path(), "meta.flag");
    }

    #[test]
    fn grafted_maps_are_reused() {
        let address = Map::builder()
            .attribute("city", AttributeSchema::string("city"))
            .build();
        let map = Map::builder()
            .graft("home", address.clone())
            .graft("contact.address", address)
            .build();
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        map.apply(&doc(json!({"contact": {"address": {"city": "Oslo"}}})), &mut ctx, &record)
            .expect("maps");
        assert_eq!(ctx.attribute(&record, "city"), Some(AttributeValue::from("Oslo")));
    }

    #[test]
    fn scalar_payloads_for_nested_maps_are_ignored() {
        let map = Map::builder()
            .attribute("author.name", AttributeSchema::string("author_name"))
            .build();
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        map.apply(&doc(json!({"author": "Ann"})), &mut ctx, &record)
            .expect("ignored");
        assert_eq!(ctx.write_count(), 0);
    }

    #[test]
    fn default_mappings_skip_the_identity_attribute() {
        let attributes = [
            AttributeSchema::string("id"),
            AttributeSchema::string("name"),
            AttributeSchema::boolean("active"),
        ];
        let map = Map::identified_by_attribute(attributes[0].clone())
            .default_mappings(&attributes)
            .build();

        assert_eq!(map.keys().collect::<Vec<_>>(), ["active", "name"]);
        assert_eq!(map.identity().map(IdentityMapping::key), Some("id"));
    }

    #[test]
    fn prepare_builds_identified_maps() {
        let map = Map::prepare(
            "uid",
            TransformChain::default(),
            AttributeSchema::string("remote_id"),
            |builder| builder.attribute("name", AttributeSchema::string("name")),
        );

        assert_eq!(map.identity().map(IdentityMapping::key), Some("uid"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    #[should_panic(expected = "collides with identity key")]
    fn identity_key_cannot_be_remapped_explicitly() {
        let _ = Map::identified_by("id", AttributeSchema::string("id"))
            .attribute("id", AttributeSchema::string("other"));
    }

    #[test]
    #[should_panic(expected = "collides with identity key")]
    fn identity_key_cannot_be_remapped_for_attribute_identity() {
        let _ = Map::identified_by_attribute(AttributeSchema::string("id"))
            .custom("id", |_: &mut MemoryContext, _: &RecordId, _: Option<&PayloadValue>| Ok(()));
    }

    #[test]
    #[should_panic(expected = "collides with identity key")]
    fn identity_key_cannot_be_remapped_in_prepare() {
        let _ = Map::prepare(
            "id",
            TransformChain::default(),
            AttributeSchema::string("id"),
            |builder| builder.graft("id.nested", Map::builder().build()),
        );
    }

    #[test]
    #[should_panic(expected = "already mapped as a nested map")]
    fn scalar_over_nested_map_is_rejected() {
        let _ = Map::builder()
            .attribute("author.name", AttributeSchema::string("author_name"))
            .attribute("author", AttributeSchema::string("author"));
    }

    #[test]
    #[should_panic(expected = "already mapped as a scalar")]
    fn nesting_under_scalar_is_rejected() {
        let _ = Map::builder()
            .attribute("author", AttributeSchema::string("author"))
            .attribute("author.name", AttributeSchema::string("author_name"));
    }

    #[test]
    fn scalar_reregistration_replaces_the_leaf() {
        let map = Map::builder()
            .attribute("name", AttributeSchema::string("first"))
            .attribute("name", AttributeSchema::string("second"))
            .build();
        let mut ctx = MemoryContext::new();
        let record = fresh(&mut ctx);

        map.apply(&doc(json!({"name": "Ann"})), &mut ctx, &record)
            .expect("maps");
        assert_eq!(ctx.attribute(&record, "first"), None);
        assert_eq!(ctx.attribute(&record, "second"), Some(AttributeValue::from("Ann")));
    }
}
