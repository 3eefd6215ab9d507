//! Relationship metadata consumed by the resolver and the engine.
//!
//! Descriptors are owned by the host persistence layer and handed to the
//! engine read-only; the engine never copies or edits them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    /// Every cardinality, in declaration order. This is the default set of
    /// recognized cardinalities for a new policy.
    pub const ALL: [Cardinality; 3] = [
        Cardinality::OneToOne,
        Cardinality::OneToMany,
        Cardinality::ManyToMany,
    ];
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToMany => "many_to_many",
        };
        f.write_str(name)
    }
}

/// Metadata about one relationship of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    /// Relation name, unique within the owning type.
    pub name: String,
    pub cardinality: Cardinality,
    /// Entity type on the far side of the relation.
    pub target_type: String,
    /// True for relations realized through an intermediate join relation.
    #[serde(default)]
    pub is_indirect: bool,
    /// Field on the child that points back at the owner. Only meaningful for
    /// direct one-to-one and one-to-many relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_reference_field: Option<String>,
    /// For indirect relations: the owner's join relation the links live in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect_target: Option<String>,
}

impl AssociationDescriptor {
    /// A direct one-to-one relation whose child carries `back_reference`.
    pub fn one_to_one(name: &str, target_type: &str, back_reference: &str) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::OneToOne,
            target_type: target_type.into(),
            is_indirect: false,
            back_reference_field: Some(back_reference.into()),
            indirect_target: None,
        }
    }

    /// A direct one-to-many relation whose children carry `back_reference`.
    pub fn one_to_many(name: &str, target_type: &str, back_reference: &str) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::OneToMany,
            back_reference_field: Some(back_reference.into()),
            ..Self::one_to_one(name, target_type, back_reference)
        }
    }

    /// A many-to-many relation stored in a join table.
    pub fn many_to_many(name: &str, target_type: &str) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::ManyToMany,
            target_type: target_type.into(),
            is_indirect: false,
            back_reference_field: None,
            indirect_target: None,
        }
    }

    /// A many-to-many relation realized through the owner's `through` relation.
    pub fn through(name: &str, target_type: &str, through: &str) -> Self {
        Self {
            is_indirect: true,
            indirect_target: Some(through.into()),
            ..Self::many_to_many(name, target_type)
        }
    }

    /// True when this is an indirect relation that names its join relation.
    pub fn is_through(&self) -> bool {
        self.is_indirect && self.indirect_target.is_some()
    }
}
