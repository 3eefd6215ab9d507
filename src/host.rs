//! Boundary with the host persistence layer.
//!
//! The engine never stores, queries or saves entities itself. Everything it
//! needs from the persistence layer goes through this trait: relationship
//! metadata, the shallow-copy primitive, relation reads and writes, and scalar
//! field access. Errors returned by an implementation are propagated to the
//! caller of [`Duplicator::duplicate`](crate::engine::Duplicator::duplicate)
//! unchanged.

use crate::association::AssociationDescriptor;
use crate::error::Result;
use serde_json::Value;
use std::fmt::Debug;

/// Capabilities the duplication engine requires from a persistence layer.
pub trait Host {
    /// Handle to one entity. Equality is entity identity.
    type Entity: Clone + PartialEq + Debug;

    /// Type identifier of `entity`, used to look up its policy.
    fn entity_type(&self, entity: &Self::Entity) -> Result<String>;

    /// Relationship metadata of `entity_type`, in declaration order.
    fn associations(&self, entity_type: &str) -> Result<Vec<AssociationDescriptor>>;

    /// A new entity with the scalar fields of `entity` and no relations.
    fn shallow_copy(&mut self, entity: &Self::Entity) -> Result<Self::Entity>;

    /// The object behind a one-to-one relation, if any.
    fn get_one(&self, entity: &Self::Entity, relation: &str) -> Result<Option<Self::Entity>>;

    /// The objects behind a collection relation, in a stable order.
    fn get_many(&self, entity: &Self::Entity, relation: &str) -> Result<Vec<Self::Entity>>;

    /// Make `value` the object behind `entity`'s one-to-one `relation`.
    fn set_one(
        &mut self,
        entity: &mut Self::Entity,
        relation: &str,
        value: Self::Entity,
    ) -> Result<()>;

    /// Add `value` to `entity`'s collection `relation`.
    fn append(&mut self, entity: &mut Self::Entity, relation: &str, value: Self::Entity)
        -> Result<()>;

    /// Current value of a scalar field; `Value::Null` when unset.
    fn get_field(&self, entity: &Self::Entity, name: &str) -> Result<Value>;

    fn set_field(&mut self, entity: &mut Self::Entity, name: &str, value: Value) -> Result<()>;

    /// The type `entity_type` specializes, if any. Policies of parent types
    /// that propagate are layered into the policies of their children.
    fn parent_type(&self, _entity_type: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Whether a field holds text. Coercions are stringified for text fields
    /// and written as-is otherwise.
    ///
    /// Asked before any field transform runs on the copy. The default
    /// inspects the value the field holds at that point; hosts with a schema
    /// should answer from it instead.
    fn is_text_field(&self, entity: &Self::Entity, name: &str) -> Result<bool> {
        Ok(matches!(self.get_field(entity, name)?, Value::String(_)))
    }
}
