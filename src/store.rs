//! In-memory record store implementing [`Host`]
//!
//! `MemoryStore` is a small relational store used to exercise the engine
//! without a database: records are typed rows of JSON fields addressed by
//! [`RecordId`], and relations are declared per entity type.
//!
//! Relations are stored the way a relational database would store them:
//!
//! - **one-to-one / one-to-many**: the child row carries a back-reference
//!   field holding the owner's id.
//! - **many-to-many**: rows in a named join table.
//! - **through**: rows of the owner's one-to-many join relation, each pointing
//!   at the target through a source field. Appending to a through relation
//!   creates a new join row.
//!
//! A type may also inherit from a parent type with
//! [`TypeDefinition::inherits`]; it then has the parent's relations ahead of
//! its own.
//!
//! ```
//! use deep_dup::store::MemoryStore;
//! use serde_json::json;
//!
//! let mut store = MemoryStore::new();
//! store
//!     .define("post")
//!     .has_many("comments", "comment", "post_id");
//!
//! let post = store.insert("post", json!({"title": "Hello"})).unwrap();
//! let comment = store.insert("comment", json!({"body": "First"})).unwrap();
//! store.link(post, "comments", comment).unwrap();
//!
//! assert_eq!(store.related(post, "comments").unwrap(), vec![comment]);
//! assert_eq!(store.field(comment, "post_id").unwrap(), json!(post.get()));
//! ```

use crate::association::{AssociationDescriptor, Cardinality};
use crate::error::{Error, Result};
use crate::host::Host;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Handle to a record in a [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().map(RecordId)
    }

    fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed row of scalar fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity_type: String,
    pub fields: BTreeMap<String, Value>,
}

/// How a relation is materialized in the store
#[derive(Debug, Clone)]
enum Link {
    ForeignKey,
    JoinTable { table: String },
    Through { source_field: String },
}

#[derive(Debug, Clone)]
struct Relation {
    descriptor: AssociationDescriptor,
    link: Link,
}

#[derive(Debug, Clone)]
struct JoinRow {
    table: String,
    owner: RecordId,
    target: RecordId,
}

/// In-memory record store for fast graph manipulation
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Relations per entity type, in declaration order
    types: HashMap<String, Vec<Relation>>,
    /// Parent of each entity type that has one
    parents: HashMap<String, String>,
    records: BTreeMap<RecordId, Record>,
    joins: Vec<JoinRow>,
    next_id: u64,
}

/// Declares the relations of one entity type
pub struct TypeDefinition<'a> {
    store: &'a mut MemoryStore,
    entity_type: String,
}

impl TypeDefinition<'_> {
    fn relation(mut self, descriptor: AssociationDescriptor, link: Link) -> Self {
        self.store
            .types
            .entry(self.entity_type.clone())
            .or_default()
            .push(Relation { descriptor, link });
        self
    }

    /// Make this type a specialization of `parent`
    pub fn inherits(self, parent: &str) -> Self {
        self.store.types.entry(parent.to_string()).or_default();
        self.store
            .parents
            .insert(self.entity_type.clone(), parent.to_string());
        self
    }

    /// A single child whose `back_reference` field holds the owner's id
    pub fn has_one(self, name: &str, target_type: &str, back_reference: &str) -> Self {
        let descriptor = AssociationDescriptor::one_to_one(name, target_type, back_reference);
        self.relation(descriptor, Link::ForeignKey)
    }

    /// Children whose `back_reference` field holds the owner's id
    pub fn has_many(self, name: &str, target_type: &str, back_reference: &str) -> Self {
        let descriptor = AssociationDescriptor::one_to_many(name, target_type, back_reference);
        self.relation(descriptor, Link::ForeignKey)
    }

    /// Targets linked through rows of the join table `table`
    pub fn many_to_many(self, name: &str, target_type: &str, table: &str) -> Self {
        let descriptor = AssociationDescriptor::many_to_many(name, target_type);
        self.relation(
            descriptor,
            Link::JoinTable {
                table: table.into(),
            },
        )
    }

    /// Targets reached through the owner's one-to-many relation `through`,
    /// whose rows point at the target with `source_field`
    pub fn through(
        self,
        name: &str,
        target_type: &str,
        through: &str,
        source_field: &str,
    ) -> Self {
        let descriptor = AssociationDescriptor::through(name, target_type, through);
        self.relation(
            descriptor,
            Link::Through {
                source_field: source_field.into(),
            },
        )
    }
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Start declaring relations for `entity_type`
    pub fn define(&mut self, entity_type: &str) -> TypeDefinition<'_> {
        self.types.entry(entity_type.to_string()).or_default();
        TypeDefinition {
            store: self,
            entity_type: entity_type.to_string(),
        }
    }

    /// Add a record; `fields` must be a JSON object
    pub fn insert(&mut self, entity_type: &str, fields: Value) -> Result<RecordId> {
        let fields = match fields {
            Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(Error::Host {
                    message: format!("record fields must be an object, got {}", other),
                })
            }
        };
        self.types.entry(entity_type.to_string()).or_default();
        Ok(self.push_record(Record {
            entity_type: entity_type.to_string(),
            fields,
        }))
    }

    fn push_record(&mut self, record: Record) -> RecordId {
        self.next_id += 1;
        let id = RecordId(self.next_id);
        self.records.insert(id, record);
        id
    }

    /// Get a record by id
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut Record> {
        self.records.get_mut(&id).ok_or_else(|| Error::UnknownEntity {
            entity: id.to_string(),
        })
    }

    /// Current value of a field, `null` when unset
    pub fn field(&self, id: RecordId, name: &str) -> Result<Value> {
        let record = self.record(id).ok_or_else(|| Error::UnknownEntity {
            entity: id.to_string(),
        })?;
        Ok(record.fields.get(name).cloned().unwrap_or(Value::Null))
    }

    /// Ids of every record of `entity_type`, oldest first
    pub fn ids_of(&self, entity_type: &str) -> Vec<RecordId> {
        self.records
            .iter()
            .filter(|(_, record)| record.entity_type == entity_type)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of records of `entity_type`
    pub fn count(&self, entity_type: &str) -> usize {
        self.ids_of(entity_type).len()
    }

    /// Get the total number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Link `target` to `owner` through `relation`
    pub fn link(&mut self, owner: RecordId, relation: &str, target: RecordId) -> Result<()> {
        let relation = self.relation(owner, relation)?.clone();
        match relation.descriptor.cardinality {
            Cardinality::OneToOne => self.assign_one(owner, &relation, target),
            Cardinality::OneToMany | Cardinality::ManyToMany => {
                self.push_link(owner, &relation, target)
            }
        }
    }

    /// Records related to `owner` through `relation`
    pub fn related(&self, owner: RecordId, relation: &str) -> Result<Vec<RecordId>> {
        let relation = self.relation(owner, relation)?;
        match &relation.link {
            Link::ForeignKey => {
                let back_reference = back_reference_of(relation)?;
                let owner_value = owner.to_value();
                Ok(self
                    .records
                    .iter()
                    .filter(|(_, record)| {
                        record.entity_type == relation.descriptor.target_type
                            && record.fields.get(back_reference) == Some(&owner_value)
                    })
                    .map(|(id, _)| *id)
                    .collect())
            }
            Link::JoinTable { table } => Ok(self
                .joins
                .iter()
                .filter(|row| row.table == *table && row.owner == owner)
                .map(|row| row.target)
                .collect()),
            Link::Through { source_field } => {
                let through = through_of(relation)?;
                let mut targets = Vec::new();
                for row in self.related(owner, through)? {
                    let value = self.field(row, source_field)?;
                    if let Some(target) = RecordId::from_value(&value) {
                        targets.push(target);
                    }
                }
                Ok(targets)
            }
        }
    }

    /// Relations of `entity_type`, inherited ones first
    fn relations_of(&self, entity_type: &str) -> Option<Vec<&Relation>> {
        if !self.types.contains_key(entity_type) {
            return None;
        }
        let mut lineage = vec![entity_type];
        while let Some(parent) = lineage.last().and_then(|ty| self.parents.get(*ty)) {
            if lineage.contains(&parent.as_str()) {
                break;
            }
            lineage.push(parent);
        }
        Some(
            lineage
                .iter()
                .rev()
                .filter_map(|ty| self.types.get(*ty))
                .flatten()
                .collect(),
        )
    }

    fn relation(&self, owner: RecordId, name: &str) -> Result<&Relation> {
        let record = self.record(owner).ok_or_else(|| Error::UnknownEntity {
            entity: owner.to_string(),
        })?;
        self.relations_of(&record.entity_type)
            .and_then(|relations| relations.into_iter().find(|r| r.descriptor.name == name))
            .ok_or_else(|| Error::UnknownAssociation {
                entity_type: record.entity_type.clone(),
                name: name.to_string(),
            })
    }

    fn assign_one(&mut self, owner: RecordId, relation: &Relation, target: RecordId) -> Result<()> {
        let back_reference = back_reference_of(relation)?.to_string();
        // Detach the previous child, as a database would on reassignment.
        for previous in self.related(owner, &relation.descriptor.name)? {
            if previous != target {
                self.record_mut(previous)?
                    .fields
                    .insert(back_reference.clone(), Value::Null);
            }
        }
        self.record_mut(target)?
            .fields
            .insert(back_reference, owner.to_value());
        Ok(())
    }

    fn push_link(&mut self, owner: RecordId, relation: &Relation, target: RecordId) -> Result<()> {
        match &relation.link {
            Link::ForeignKey => {
                let back_reference = back_reference_of(relation)?.to_string();
                self.record_mut(target)?
                    .fields
                    .insert(back_reference, owner.to_value());
            }
            Link::JoinTable { table } => self.joins.push(JoinRow {
                table: table.clone(),
                owner,
                target,
            }),
            Link::Through { source_field } => {
                let join_relation = self.relation(owner, through_of(relation)?)?.clone();
                let back_reference = back_reference_of(&join_relation)?;
                let mut fields = BTreeMap::new();
                fields.insert(back_reference.to_string(), owner.to_value());
                fields.insert(source_field.clone(), target.to_value());
                self.push_record(Record {
                    entity_type: join_relation.descriptor.target_type.clone(),
                    fields,
                });
            }
        }
        Ok(())
    }
}

fn back_reference_of(relation: &Relation) -> Result<&str> {
    relation
        .descriptor
        .back_reference_field
        .as_deref()
        .ok_or_else(|| Error::Host {
            message: format!(
                "relation '{}' has no back-reference field",
                relation.descriptor.name
            ),
        })
}

fn through_of(relation: &Relation) -> Result<&str> {
    relation
        .descriptor
        .indirect_target
        .as_deref()
        .ok_or_else(|| Error::Host {
            message: format!(
                "relation '{}' has no join relation",
                relation.descriptor.name
            ),
        })
}

impl Host for MemoryStore {
    type Entity = RecordId;

    fn entity_type(&self, entity: &RecordId) -> Result<String> {
        self.record(*entity)
            .map(|record| record.entity_type.clone())
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    fn associations(&self, entity_type: &str) -> Result<Vec<AssociationDescriptor>> {
        self.relations_of(entity_type)
            .map(|relations| relations.into_iter().map(|r| r.descriptor.clone()).collect())
            .ok_or_else(|| Error::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }

    fn shallow_copy(&mut self, entity: &RecordId) -> Result<RecordId> {
        let record = self
            .record(*entity)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })?;
        Ok(self.push_record(record))
    }

    fn parent_type(&self, entity_type: &str) -> Result<Option<String>> {
        Ok(self.parents.get(entity_type).cloned())
    }

    fn get_one(&self, entity: &RecordId, relation: &str) -> Result<Option<RecordId>> {
        Ok(self.related(*entity, relation)?.into_iter().next())
    }

    fn get_many(&self, entity: &RecordId, relation: &str) -> Result<Vec<RecordId>> {
        self.related(*entity, relation)
    }

    fn set_one(&mut self, entity: &mut RecordId, relation: &str, value: RecordId) -> Result<()> {
        let relation = self.relation(*entity, relation)?.clone();
        self.assign_one(*entity, &relation, value)
    }

    fn append(&mut self, entity: &mut RecordId, relation: &str, value: RecordId) -> Result<()> {
        let relation = self.relation(*entity, relation)?.clone();
        self.push_link(*entity, &relation, value)
    }

    fn get_field(&self, entity: &RecordId, name: &str) -> Result<Value> {
        self.field(*entity, name)
    }

    fn set_field(&mut self, entity: &mut RecordId, name: &str, value: Value) -> Result<()> {
        self.record_mut(*entity)?
            .fields
            .insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blog() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .define("post")
            .has_one("header", "header", "post_id")
            .has_many("comments", "comment", "post_id")
            .has_many("taggings", "tagging", "post_id")
            .through("tags", "tag", "taggings", "tag_id")
            .many_to_many("categories", "category", "categories_posts");
        store
    }

    #[test]
    fn test_insert_and_field() {
        let mut store = MemoryStore::new();
        let id = store.insert("post", json!({"title": "A"})).unwrap();
        assert_eq!(store.field(id, "title").unwrap(), json!("A"));
        assert_eq!(store.field(id, "missing").unwrap(), Value::Null);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count("post"), 1);
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.insert("post", json!([1, 2])),
            Err(Error::Host { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_ids_display() {
        let mut store = MemoryStore::new();
        let id = store.insert("post", json!({})).unwrap();
        assert_eq!(id.to_string(), "#1");
        assert_eq!(id.get(), 1);
    }

    #[test]
    fn test_shallow_copy_copies_fields_not_relations() {
        let mut store = blog();
        let post = store.insert("post", json!({"title": "A"})).unwrap();
        let comment = store.insert("comment", json!({"body": "c"})).unwrap();
        store.link(post, "comments", comment).unwrap();

        let copy = store.shallow_copy(&post).unwrap();

        assert_ne!(copy, post);
        assert_eq!(store.record(copy).unwrap(), store.record(post).unwrap());
        assert!(store.related(copy, "comments").unwrap().is_empty());
    }

    #[test]
    fn test_has_one_reassignment_detaches_previous() {
        let mut store = blog();
        let mut post = store.insert("post", json!({})).unwrap();
        let first = store.insert("header", json!({})).unwrap();
        let second = store.insert("header", json!({})).unwrap();

        store.set_one(&mut post, "header", first).unwrap();
        store.set_one(&mut post, "header", second).unwrap();

        assert_eq!(store.get_one(&post, "header").unwrap(), Some(second));
        assert_eq!(store.field(first, "post_id").unwrap(), Value::Null);
    }

    #[test]
    fn test_join_table_links() {
        let mut store = blog();
        let mut post = store.insert("post", json!({})).unwrap();
        let news = store.insert("category", json!({"name": "news"})).unwrap();

        store.append(&mut post, "categories", news).unwrap();

        assert_eq!(store.get_many(&post, "categories").unwrap(), vec![news]);
        assert_eq!(store.count("category"), 1);
    }

    #[test]
    fn test_through_append_creates_join_row() {
        let mut store = blog();
        let mut post = store.insert("post", json!({})).unwrap();
        let rust = store.insert("tag", json!({"name": "rust"})).unwrap();

        store.append(&mut post, "tags", rust).unwrap();

        assert_eq!(store.get_many(&post, "tags").unwrap(), vec![rust]);
        let taggings = store.get_many(&post, "taggings").unwrap();
        assert_eq!(taggings.len(), 1);
        assert_eq!(store.field(taggings[0], "tag_id").unwrap(), json!(rust.get()));
    }

    #[test]
    fn test_associations_in_declaration_order() {
        let store = blog();
        let names: Vec<_> = store
            .associations("post")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["header", "comments", "taggings", "tags", "categories"]
        );
    }

    #[test]
    fn test_unknown_relation_and_entity() {
        let mut store = blog();
        let post = store.insert("post", json!({})).unwrap();

        assert!(matches!(
            store.get_many(&post, "widgets"),
            Err(Error::UnknownAssociation { .. })
        ));
        assert!(matches!(
            store.entity_type(&RecordId(99)),
            Err(Error::UnknownEntity { .. })
        ));
        assert!(matches!(
            store.associations("widget"),
            Err(Error::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn test_child_type_has_parent_relations() {
        let mut store = blog();
        store.define("article").inherits("post").has_many("footnotes", "footnote", "article_id");
        let article = store.insert("article", json!({})).unwrap();
        let comment = store.insert("comment", json!({"body": "c"})).unwrap();

        store.link(article, "comments", comment).unwrap();

        let names: Vec<_> = store
            .associations("article")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["header", "comments", "taggings", "tags", "categories", "footnotes"]
        );
        assert_eq!(store.related(article, "comments").unwrap(), vec![comment]);
        assert_eq!(store.parent_type("article").unwrap(), Some("post".to_string()));
        assert_eq!(store.parent_type("post").unwrap(), None);
    }

    #[test]
    fn test_default_is_text_field() {
        let mut store = MemoryStore::new();
        let id = store.insert("post", json!({"title": "A", "views": 1})).unwrap();
        assert!(store.is_text_field(&id, "title").unwrap());
        assert!(!store.is_text_field(&id, "views").unwrap());
        assert!(!store.is_text_field(&id, "missing").unwrap());
    }
}
