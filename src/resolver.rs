//! Association resolution
//!
//! Turns the relationship metadata of an entity type and its
//! [`AssociationRules`] into the ordered list of relations one duplication
//! run walks, each tagged with whether its children are cloned.
//!
//! Resolution is a pure function. When an indirect relation is cloned, its
//! join relation is excluded for the call so the join rows are not copied
//! alongside the rows created by re-attaching the cloned targets. That
//! exclusion is an overlay on top of the rules and never written back.

use log::debug;

use crate::association::AssociationDescriptor;
use crate::error::{Error, Result};
use crate::policy::AssociationRules;

/// One relation selected for a duplication run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAssociation<'a> {
    pub descriptor: &'a AssociationDescriptor,
    /// Deep-copy the children instead of re-linking them
    pub clone: bool,
}

fn find<'a>(descriptors: &'a [AssociationDescriptor], name: &str) -> Option<&'a AssociationDescriptor> {
    descriptors.iter().find(|descriptor| descriptor.name == name)
}

/// Join relations made redundant by cloning the indirect relations built on
/// them. Names in `clones` that match no descriptor are ignored here.
pub fn through_excludes(descriptors: &[AssociationDescriptor], rules: &AssociationRules) -> Vec<String> {
    let mut excludes: Vec<String> = Vec::new();
    for name in &rules.clones {
        let Some(descriptor) = find(descriptors, name) else {
            continue;
        };
        if !descriptor.is_indirect {
            continue;
        }
        if let Some(target) = &descriptor.indirect_target {
            if !excludes.contains(target) {
                excludes.push(target.clone());
            }
        }
    }
    excludes
}

/// Check that every relation named by `rules` exists among `descriptors`.
pub fn check_names(
    entity_type: &str,
    descriptors: &[AssociationDescriptor],
    rules: &AssociationRules,
) -> Result<()> {
    let named = rules
        .includes
        .iter()
        .chain(&rules.excludes)
        .chain(&rules.clones);
    for name in named {
        if find(descriptors, name).is_none() {
            return Err(Error::UnknownAssociation {
                entity_type: entity_type.to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Relations to process for `entity_type`, in processing order.
///
/// Includes are taken literally and win over excludes, derived ones
/// included. Relations of an unrecognized cardinality are always skipped.
pub fn resolve<'a>(
    entity_type: &str,
    descriptors: &'a [AssociationDescriptor],
    rules: &AssociationRules,
) -> Result<Vec<ResolvedAssociation<'a>>> {
    check_names(entity_type, descriptors, rules)?;

    let candidates: Vec<&'a AssociationDescriptor> = if !rules.includes.is_empty() {
        rules
            .includes
            .iter()
            .filter_map(|name| find(descriptors, name))
            .collect()
    } else {
        let derived = through_excludes(descriptors, rules);
        if !derived.is_empty() {
            debug!("{}: excluding join relations {:?}", entity_type, derived);
        }
        descriptors
            .iter()
            .filter(|descriptor| {
                !rules.excludes.contains(&descriptor.name) && !derived.contains(&descriptor.name)
            })
            .collect()
    };

    let mut resolved = Vec::with_capacity(candidates.len());
    for descriptor in candidates {
        if !rules.recognizes(descriptor.cardinality) {
            debug!(
                "{}: skipping {} relation '{}'",
                entity_type, descriptor.cardinality, descriptor.name
            );
            continue;
        }
        resolved.push(ResolvedAssociation {
            descriptor,
            clone: rules.is_cloned(&descriptor.name),
        });
    }
    Ok(resolved)
}
