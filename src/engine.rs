//! # Duplication Engine
//!
//! [`Duplicator`] executes a deep copy against a [`Host`]. For each entity it
//! copies, the steps are:
//!
//! 1. Shallow-copy the source through the host, or through the policy's own
//!    copy primitive when it has one.
//! 2. Run the policy's before-hooks.
//! 3. If association processing is enabled, resolve the relations to walk
//!    and copy or re-link each one according to its cardinality. Includes
//!    and excludes that carry a condition are settled against the source.
//! 4. Run the after-hooks.
//! 5. If post-processing is enabled, apply the field transforms.
//!
//! The policy of each entity is its type's effective policy, which includes
//! what ancestor types propagate. Children that are copied go through the
//! same steps under their own type's policy, so a deep copy is a depth-first recursion over the object graph.
//! Recursion is bounded: reaching a `(type, entity)` pair that is already on
//! the current ancestry path fails with [`Error::CycleDetected`], and going
//! deeper than [`DuplicateOptions::max_depth`] fails with
//! [`Error::DepthExceeded`]. The same child reached along two different
//! branches is copied twice and is not a cycle.
//!
//! The source entity is never written to. Any failure aborts the whole copy;
//! rows the host already created are the host's to clean up.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, trace};

use crate::association::{AssociationDescriptor, Cardinality};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::policy::DuplicationPolicy;
use crate::registry::PolicyRegistry;
use crate::resolver::{self, ResolvedAssociation};

/// Default recursion limit of a [`Duplicator`]
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tuning knobs of a duplication run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateOptions {
    /// Deepest nesting level that may be copied; the root is level 0.
    pub max_depth: usize,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// State of one entity being copied
struct DuplicationContext<'s, H: Host> {
    entity_type: String,
    source: &'s H::Entity,
    result: H::Entity,
    policy: Arc<DuplicationPolicy<H>>,
}

type Ancestry<H> = Vec<(String, <H as Host>::Entity)>;

/// Deep-copies entities using the policies of a [`PolicyRegistry`]
pub struct Duplicator<'r, H: Host> {
    registry: &'r PolicyRegistry<H>,
    options: DuplicateOptions,
}

impl<'r, H: Host> Duplicator<'r, H> {
    pub fn new(registry: &'r PolicyRegistry<H>) -> Self {
        Self::with_options(registry, DuplicateOptions::default())
    }

    pub fn with_options(registry: &'r PolicyRegistry<H>, options: DuplicateOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &DuplicateOptions {
        &self.options
    }

    /// Deep-copy `source` and return the copy.
    pub fn duplicate(&self, host: &mut H, source: &H::Entity) -> Result<H::Entity> {
        let mut ancestry = Ancestry::<H>::new();
        self.duplicate_at(host, source, &mut ancestry)
    }

    fn duplicate_at(
        &self,
        host: &mut H,
        source: &H::Entity,
        ancestry: &mut Ancestry<H>,
    ) -> Result<H::Entity> {
        let entity_type = host.entity_type(source)?;

        if ancestry
            .iter()
            .any(|(ty, entity)| *ty == entity_type && entity == source)
        {
            return Err(Error::CycleDetected {
                cycle: describe_cycle::<H>(ancestry, &entity_type, source),
            });
        }
        if ancestry.len() > self.options.max_depth {
            return Err(Error::DepthExceeded {
                limit: self.options.max_depth,
            });
        }

        let policy = self.registry.effective_policy(host, &entity_type)?;
        debug!(
            "duplicating {} {:?} at depth {}",
            entity_type,
            source,
            ancestry.len()
        );
        let result = match policy.copier() {
            Some(copy) => copy(host, source)?,
            None => host.shallow_copy(source)?,
        };
        let context = DuplicationContext {
            result,
            entity_type: entity_type.clone(),
            source,
            policy,
        };

        ancestry.push((entity_type, source.clone()));
        let copied = self.run(host, context, ancestry);
        ancestry.pop();
        copied
    }

    fn run(
        &self,
        host: &mut H,
        mut context: DuplicationContext<'_, H>,
        ancestry: &mut Ancestry<H>,
    ) -> Result<H::Entity> {
        let policy = Arc::clone(&context.policy);

        for hook in policy.before_hooks() {
            hook(host, context.source, &mut context.result)?;
        }

        if policy.is_enabled() {
            let descriptors = host.associations(&context.entity_type)?;
            let rules = policy.rules_for(host, context.source)?;
            if let Cow::Owned(_) = rules {
                resolver::check_names(&context.entity_type, &descriptors, policy.rules())?;
            }
            let resolved = resolver::resolve(&context.entity_type, &descriptors, &rules)?;
            for association in &resolved {
                let name = association.descriptor.name.as_str();
                if !policy.admits(host, context.source, name)? {
                    trace!("{}: condition on '{}' does not hold", context.entity_type, name);
                    continue;
                }
                self.copy_association(host, &mut context, association, ancestry)?;
            }
        }

        for hook in policy.after_hooks() {
            hook(host, context.source, &mut context.result)?;
        }

        if policy.runs_preprocessing() {
            policy.transforms().apply(host, &mut context.result)?;
        }

        Ok(context.result)
    }

    fn copy_association(
        &self,
        host: &mut H,
        context: &mut DuplicationContext<'_, H>,
        association: &ResolvedAssociation<'_>,
        ancestry: &mut Ancestry<H>,
    ) -> Result<()> {
        let descriptor = association.descriptor;
        let name = descriptor.name.as_str();
        let source = context.source;

        match (descriptor.cardinality, association.clone) {
            (Cardinality::OneToOne, _) => {
                if descriptor.is_indirect {
                    trace!("{}: skipping indirect relation '{}'", context.entity_type, name);
                    return Ok(());
                }
                if let Some(child) = host.get_one(source, name)? {
                    let mut copy = self.duplicate_at(host, &child, ancestry)?;
                    clear_back_reference(host, descriptor, &mut copy)?;
                    host.set_one(&mut context.result, name, copy)?;
                }
            }
            (Cardinality::OneToMany, false) => {
                if descriptor.is_indirect {
                    trace!("{}: skipping indirect relation '{}'", context.entity_type, name);
                    return Ok(());
                }
                let target = match context.policy.remapper() {
                    Some(remap) => remap(host, source, name)?,
                    None => None,
                };
                let target = target.as_deref().unwrap_or(name);
                if target != name {
                    trace!("{}: remapping '{}' to '{}'", context.entity_type, name, target);
                }
                for child in host.get_many(source, name)? {
                    let mut copy = self.duplicate_at(host, &child, ancestry)?;
                    clear_back_reference(host, descriptor, &mut copy)?;
                    host.append(&mut context.result, target, copy)?;
                }
            }
            (Cardinality::OneToMany, true) | (Cardinality::ManyToMany, true) => {
                for child in host.get_many(source, name)? {
                    let copy = self.duplicate_at(host, &child, ancestry)?;
                    host.append(&mut context.result, name, copy)?;
                }
            }
            (Cardinality::ManyToMany, false) => {
                if descriptor.is_indirect {
                    trace!("{}: skipping indirect relation '{}'", context.entity_type, name);
                    return Ok(());
                }
                for child in host.get_many(source, name)? {
                    host.append(&mut context.result, name, child)?;
                }
            }
        }

        trace!(
            "{}: processed {} relation '{}' (clone: {})",
            context.entity_type,
            descriptor.cardinality,
            name,
            association.clone
        );
        Ok(())
    }
}

fn clear_back_reference<H: Host>(
    host: &mut H,
    descriptor: &AssociationDescriptor,
    copy: &mut H::Entity,
) -> Result<()> {
    match &descriptor.back_reference_field {
        Some(field) => host.set_field(copy, field, serde_json::Value::Null),
        None => Ok(()),
    }
}

fn describe_cycle<H: Host>(ancestry: &Ancestry<H>, entity_type: &str, entity: &H::Entity) -> String {
    let start = ancestry
        .iter()
        .position(|(ty, e)| ty == entity_type && e == entity)
        .unwrap_or(0);
    let mut steps: Vec<String> = ancestry[start..]
        .iter()
        .map(|(ty, e)| format!("{} {:?}", ty, e))
        .collect();
    steps.push(format!("{} {:?}", entity_type, entity));
    steps.join(" -> ")
}
