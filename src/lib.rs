//! # Deep Duplication Library
//!
//! This library lets an entity type declare, once, how its instances are
//! deep-copied: which relations to follow, which to skip, which children to
//! clone rather than re-link, and how scalar fields on the copy are rewritten.
//! The persistence layer itself stays outside the library and is reached
//! through the [`Host`] trait.
//!
//! ## Quick Example
//!
//! ```
//! use deep_dup::store::MemoryStore;
//! use deep_dup::{Duplicator, PolicyRegistry};
//! use serde_json::json;
//!
//! // A post with two comments
//! let mut store = MemoryStore::new();
//! store.define("post").has_many("comments", "comment", "post_id");
//! let post = store.insert("post", json!({"title": "Hello"})).unwrap();
//! for body in ["first", "second"] {
//!     let comment = store.insert("comment", json!({ "body": body })).unwrap();
//!     store.link(post, "comments", comment).unwrap();
//! }
//!
//! // Copy the comments along with the post and retitle the copy
//! let registry: PolicyRegistry<MemoryStore> = PolicyRegistry::new();
//! registry
//!     .configure("post", |p| {
//!         p.include_field("comments").prepend("title", "Copy of ");
//!     })
//!     .unwrap();
//!
//! let copy = Duplicator::new(&registry).duplicate(&mut store, &post).unwrap();
//!
//! assert_eq!(store.field(copy, "title").unwrap(), json!("Copy of Hello"));
//! assert_eq!(store.related(copy, "comments").unwrap().len(), 2);
//! assert_eq!(store.related(post, "comments").unwrap().len(), 2);
//! ```
//!
//! ## Core Concepts
//!
//! - **Policies (`policy`)**: `DuplicationPolicy` holds the association rules,
//!   field transforms and hooks of one entity type; `PolicyBuilder` is the
//!   fluent surface that mutates it.
//! - **Registry (`registry`)**: maps entity types to their policies and
//!   layers in what parent types propagate to their children. Policies can
//!   also be loaded from YAML documents (`config`).
//! - **Resolution (`resolver`)**: selects the relations a duplication walks,
//!   including the exclusion of join relations made redundant by cloning a
//!   through relation.
//! - **Engine (`engine`)**: `Duplicator` performs the recursive copy,
//!   dispatching on relation cardinality.
//! - **Transforms (`transform`)**: the nullify, coerce, prefix, suffix and
//!   regex pipeline applied to each copy.
//! - **Host boundary (`host`, `store`)**: the `Host` trait, and `MemoryStore`,
//!   an in-memory implementation of it.

pub mod association;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod transform;

#[cfg(test)]
mod transform_proptest;

pub use association::{AssociationDescriptor, Cardinality};
pub use engine::{DuplicateOptions, Duplicator};
pub use error::{Error, Result};
pub use host::Host;
pub use policy::{DuplicationPolicy, Parenting, PolicyBuilder};
pub use registry::PolicyRegistry;
pub use transform::{FieldTransforms, RegexRule};
