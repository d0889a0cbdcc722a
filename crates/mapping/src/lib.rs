//! Payload Mapping Layer
//!
//! Declarative mapping of loosely-typed, hierarchical payload documents onto
//! strongly-typed record attributes.
//!
//! ## What we do here
//!
//! - **Describe attributes** - [`AttributeSchema`] names a persisted attribute,
//!   its [`ScalarKind`], optionality, and default
//! - **Rewrite raw values** - [`TransformChain`] runs pure steps before coercion,
//!   always starting with null-to-absent
//! - **Coerce** - [`coerce`] turns payload values into typed [`store::AttributeValue`]s
//! - **Map key paths** - [`PayloadMap`] is a frozen tree of scalar and nested
//!   mappings with at most one identity mapping
//! - **Avoid writes** - attributes are only assigned when the value changes
//! - **Report paths** - [`MappingError`] names the full dotted key path of a failure
//!
//! ## Example
//!
//! ```
//! use mapping::{AttributeSchema, PayloadMap, TransformChain, ValueTransform};
//! use store::{document_from_json, AttributeValue, Context, MemoryContext};
//!
//! let map = PayloadMap::<MemoryContext>::identified_by("id", AttributeSchema::integer64("id"))
//!     .attribute_with(
//!         "name",
//!         TransformChain::new([ValueTransform::trim_strings()]),
//!         AttributeSchema::string("name"),
//!     )
//!     .build();
//!
//! let mut ctx = MemoryContext::new();
//! let record = ctx.create_record("Person").unwrap();
//! let doc = document_from_json(serde_json::json!({"id": "7", "name": " Ann "})).unwrap();
//!
//! map.apply(&doc, &mut ctx, &record).unwrap();
//! assert_eq!(ctx.attribute(&record, "id"), Some(AttributeValue::Int64(7)));
//! assert_eq!(ctx.attribute(&record, "name"), Some(AttributeValue::from("Ann")));
//! ```
mod applicator;
mod coerce;
mod error;
mod identity;
mod map;
mod scalar;
mod schema;
mod transform;

pub use crate::applicator::{ApplyPayload, PayloadApplicator};
pub use crate::coerce::coerce;
pub use crate::error::{BoxError, MappingError};
pub use crate::identity::{Identity, IdentityMapping, NormalizedIdentity};
pub use crate::map::{MapNode, PayloadMap, PayloadMapBuilder};
pub use crate::scalar::{AttributeMap, CustomMap, ScalarMap, WriteFn};
pub use crate::schema::{AttributeSchema, ScalarKind};
pub use crate::transform::{TransformChain, TransformError, ValueTransform};
