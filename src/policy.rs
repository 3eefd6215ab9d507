//! # Duplication Policies
//!
//! A [`DuplicationPolicy`] is the declarative description of how one entity
//! type is deep-copied. It has three parts:
//!
//! - **[`AssociationRules`]**: whether associations are processed at all,
//!   which relations to include or exclude, which to clone rather than
//!   re-link, and which cardinalities are recognized.
//! - **[`FieldTransforms`]**: scalar rewrites applied to the copy once its
//!   associations are in place.
//! - **Hooks**: callbacks run before and after association processing,
//!   plus optional replacements for the shallow copy primitive and for the
//!   relation name children are written to.
//!
//! A policy may also propagate to the policies of child entity types (see
//! [`Parenting`]); the registry layers the two when a child is duplicated.
//!
//! Policies are mutated only through a [`PolicyBuilder`] and read through the
//! accessor methods on `DuplicationPolicy`.
//!
//! ## Builder call forms
//!
//! Every list-valued setter has a singular form that appends one value and a
//! plural form that replaces the whole list. Map-valued setters have a single
//! form that merges one entry and an `_all` form that clears the map and then
//! merges each entry in order, so a later entry overrides an earlier one for
//! the same field. Lists are de-duplicated after every call.
//!
//! Values that are `null` or `false` are dropped by the map setters, except
//! for coercions (`set`), which keep `false`, `0` and every other non-null
//! value.

use crate::association::Cardinality;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::transform::{render_text, FieldMap, FieldTransforms, RegexRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Callback run around association processing with `(host, source, result)`.
pub type Hook<H> = Arc<
    dyn Fn(&mut H, &<H as Host>::Entity, &mut <H as Host>::Entity) -> Result<()> + Send + Sync,
>;

/// Replacement for [`Host::shallow_copy`] as the first step of copying an
/// entity of one type.
pub type Copier<H> =
    Arc<dyn Fn(&mut H, &<H as Host>::Entity) -> Result<<H as Host>::Entity> + Send + Sync>;

/// Picks the relation on the copy that receives re-attached children of the
/// relation named by the third argument. `None` keeps the original name.
pub type Remapper<H> =
    Arc<dyn Fn(&H, &<H as Host>::Entity, &str) -> Result<Option<String>> + Send + Sync>;

/// Predicate on the source entity guarding one include or exclude.
pub type Condition<H> = Arc<dyn Fn(&H, &<H as Host>::Entity) -> Result<bool> + Send + Sync>;

/// How a policy passes its settings on to the policies of child types.
///
/// A child's own policy and its parent's are layered as if the builder calls
/// of one were replayed on top of the other: lists are extended, maps are
/// merged entry by entry and the later layer wins each conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parenting {
    /// The child's settings are layered over the parent's.
    #[default]
    Submissive,
    /// The parent's settings are layered over the child's.
    Dominant,
    /// The child picks with [`PolicyBuilder::raised`]; submissive otherwise.
    Relaxed,
}

impl Parenting {
    /// The style that applies to a child raised as `raised`.
    pub fn settle(self, raised: Option<Parenting>) -> Parenting {
        match (self, raised) {
            (Parenting::Relaxed, Some(Parenting::Dominant)) => Parenting::Dominant,
            (Parenting::Relaxed, _) => Parenting::Submissive,
            (style, _) => style,
        }
    }
}

/// Association-related settings of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRules {
    /// Whether any association processing happens.
    #[serde(default)]
    pub enabled: bool,
    /// Relations to process, in this order. Wins over `excludes`.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Relations to skip when `includes` is empty.
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Relations whose children are deep-copied instead of re-linked.
    #[serde(default)]
    pub clones: Vec<String>,
    /// Cardinalities that may be processed at all.
    #[serde(default = "all_cardinalities")]
    pub recognized: Vec<Cardinality>,
}

fn all_cardinalities() -> Vec<Cardinality> {
    Cardinality::ALL.to_vec()
}

impl Default for AssociationRules {
    fn default() -> Self {
        Self {
            enabled: false,
            includes: Vec::new(),
            excludes: Vec::new(),
            clones: Vec::new(),
            recognized: all_cardinalities(),
        }
    }
}

impl AssociationRules {
    pub fn recognizes(&self, cardinality: Cardinality) -> bool {
        self.recognized.contains(&cardinality)
    }

    pub fn is_cloned(&self, relation: &str) -> bool {
        self.clones.iter().any(|name| name == relation)
    }
}

/// The full duplication configuration of one entity type.
pub struct DuplicationPolicy<H: Host> {
    rules: AssociationRules,
    run_preprocessing: bool,
    transforms: FieldTransforms,
    before_hooks: Vec<Hook<H>>,
    after_hooks: Vec<Hook<H>>,
    include_conditions: FieldMap<Condition<H>>,
    exclude_conditions: FieldMap<Condition<H>>,
    copier: Option<Copier<H>>,
    remapper: Option<Remapper<H>>,
    parenting: Option<Parenting>,
    raised: Option<Parenting>,
}

impl<H: Host> Default for DuplicationPolicy<H> {
    fn default() -> Self {
        Self {
            rules: AssociationRules::default(),
            run_preprocessing: false,
            transforms: FieldTransforms::default(),
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
            include_conditions: FieldMap::new(),
            exclude_conditions: FieldMap::new(),
            copier: None,
            remapper: None,
            parenting: None,
            raised: None,
        }
    }
}

impl<H: Host> Clone for DuplicationPolicy<H> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            run_preprocessing: self.run_preprocessing,
            transforms: self.transforms.clone(),
            before_hooks: self.before_hooks.clone(),
            after_hooks: self.after_hooks.clone(),
            include_conditions: self.include_conditions.clone(),
            exclude_conditions: self.exclude_conditions.clone(),
            copier: self.copier.clone(),
            remapper: self.remapper.clone(),
            parenting: self.parenting,
            raised: self.raised,
        }
    }
}

impl<H: Host> fmt::Debug for DuplicationPolicy<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicationPolicy")
            .field("rules", &self.rules)
            .field("run_preprocessing", &self.run_preprocessing)
            .field("transforms", &self.transforms)
            .field("before_hooks", &self.before_hooks.len())
            .field("after_hooks", &self.after_hooks.len())
            .field(
                "include_conditions",
                &self.include_conditions.keys().collect::<Vec<_>>(),
            )
            .field(
                "exclude_conditions",
                &self.exclude_conditions.keys().collect::<Vec<_>>(),
            )
            .field("copier", &self.copier.is_some())
            .field("remapper", &self.remapper.is_some())
            .field("parenting", &self.parenting)
            .field("raised", &self.raised)
            .finish()
    }
}

impl<H: Host> DuplicationPolicy<H> {
    /// A disabled policy: duplication is a plain shallow copy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start mutating this policy
    pub fn builder(&mut self) -> PolicyBuilder<'_, H> {
        PolicyBuilder::new(self)
    }

    /// Check settings that can be verified without the host, namely that
    /// every regex rule compiles.
    pub fn validate(&self, entity_type: &str) -> Result<()> {
        self.transforms
            .validate()
            .map_err(|err| Error::InvalidPolicy {
                entity_type: entity_type.to_string(),
                message: err.to_string(),
            })
    }

    pub fn is_enabled(&self) -> bool {
        self.rules.enabled
    }

    /// Whether field post-processing runs on the result.
    pub fn runs_preprocessing(&self) -> bool {
        self.run_preprocessing
    }

    pub fn rules(&self) -> &AssociationRules {
        &self.rules
    }

    pub fn transforms(&self) -> &FieldTransforms {
        &self.transforms
    }

    pub fn includes(&self) -> &[String] {
        &self.rules.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.rules.excludes
    }

    pub fn clones(&self) -> &[String] {
        &self.rules.clones
    }

    pub fn recognized(&self) -> &[Cardinality] {
        &self.rules.recognized
    }

    pub fn null_fields(&self) -> &[String] {
        &self.transforms.null_fields
    }

    pub fn coercions(&self) -> &FieldMap<Value> {
        &self.transforms.coercions
    }

    pub fn prefixes(&self) -> &FieldMap<String> {
        &self.transforms.prefixes
    }

    pub fn suffixes(&self) -> &FieldMap<String> {
        &self.transforms.suffixes
    }

    pub fn regexes(&self) -> &FieldMap<RegexRule> {
        &self.transforms.regexes
    }

    pub fn before_hooks(&self) -> &[Hook<H>] {
        &self.before_hooks
    }

    pub fn after_hooks(&self) -> &[Hook<H>] {
        &self.after_hooks
    }

    pub fn include_condition(&self, relation: &str) -> Option<&Condition<H>> {
        self.include_conditions.get(relation)
    }

    pub fn exclude_condition(&self, relation: &str) -> Option<&Condition<H>> {
        self.exclude_conditions.get(relation)
    }

    /// Copy primitive replacing the host's shallow copy, if any.
    pub fn copier(&self) -> Option<&Copier<H>> {
        self.copier.as_ref()
    }

    pub fn remapper(&self) -> Option<&Remapper<H>> {
        self.remapper.as_ref()
    }

    /// How this policy propagates to child types; `None` when it does not.
    pub fn parenting(&self) -> Option<Parenting> {
        self.parenting
    }

    pub fn raised(&self) -> Option<Parenting> {
        self.raised
    }

    /// The association rules with conditional excludes settled against
    /// `source`: an exclude whose condition does not hold is dropped.
    pub fn rules_for(&self, host: &H, source: &H::Entity) -> Result<Cow<'_, AssociationRules>> {
        let mut rules = Cow::Borrowed(&self.rules);
        for (relation, condition) in self.exclude_conditions.iter() {
            if !condition(host, source)? {
                rules.to_mut().excludes.retain(|name| name != relation);
            }
        }
        Ok(rules)
    }

    /// Whether the include condition of `relation`, if any, holds for
    /// `source`.
    pub fn admits(&self, host: &H, source: &H::Entity, relation: &str) -> Result<bool> {
        match self.include_conditions.get(relation) {
            Some(condition) => condition(host, source),
            None => Ok(true),
        }
    }

    /// This policy as seen by a child type whose parent type has `parent`.
    ///
    /// When `parent` does not propagate, the result equals `self`.
    pub fn inherited_from(&self, parent: &Self) -> Self {
        match parent.parenting {
            None => self.clone(),
            Some(style) => match style.settle(self.raised) {
                Parenting::Dominant => Self::layered(self, parent),
                Parenting::Submissive | Parenting::Relaxed => Self::layered(parent, self),
            },
        }
    }

    /// `over` replayed on top of `base`.
    fn layered(base: &Self, over: &Self) -> Self {
        let mut merged = base.clone();

        let rules = &mut merged.rules;
        rules.enabled |= over.rules.enabled;
        if !over.rules.includes.is_empty() {
            rules.excludes.clear();
            merged.exclude_conditions.clear();
            rules.includes = unique(rules.includes.iter().chain(&over.rules.includes).cloned());
        } else if !over.rules.excludes.is_empty() {
            rules.includes.clear();
            merged.include_conditions.clear();
            rules.excludes = unique(rules.excludes.iter().chain(&over.rules.excludes).cloned());
        }
        rules.clones = unique(rules.clones.iter().chain(&over.rules.clones).cloned());
        if over.rules.recognized != all_cardinalities() {
            rules.recognized = over.rules.recognized.clone();
        }
        for (relation, condition) in over.include_conditions.iter() {
            merged.include_conditions.insert(relation, Arc::clone(condition));
        }
        for (relation, condition) in over.exclude_conditions.iter() {
            merged.exclude_conditions.insert(relation, Arc::clone(condition));
        }

        merged.run_preprocessing |= over.run_preprocessing;
        let transforms = &mut merged.transforms;
        transforms.null_fields = unique(
            transforms
                .null_fields
                .iter()
                .chain(&over.transforms.null_fields)
                .cloned(),
        );
        for (field, value) in over.transforms.coercions.iter() {
            transforms.coercions.insert(field, value.clone());
        }
        for (field, prefix) in over.transforms.prefixes.iter() {
            transforms.prefixes.insert(field, prefix.clone());
        }
        for (field, suffix) in over.transforms.suffixes.iter() {
            transforms.suffixes.insert(field, suffix.clone());
        }
        for (field, rule) in over.transforms.regexes.iter() {
            transforms.regexes.insert(field, rule.clone());
        }

        merged.before_hooks = unique_hooks(base.before_hooks.iter().chain(&over.before_hooks).cloned());
        merged.after_hooks = unique_hooks(base.after_hooks.iter().chain(&over.after_hooks).cloned());
        if over.copier.is_some() {
            merged.copier = over.copier.clone();
        }
        if over.remapper.is_some() {
            merged.remapper = over.remapper.clone();
        }
        merged.parenting = over.parenting.or(base.parenting);
        merged.raised = over.raised.or(base.raised);
        merged
    }
}

/// Fluent mutation surface over one [`DuplicationPolicy`].
pub struct PolicyBuilder<'a, H: Host> {
    policy: &'a mut DuplicationPolicy<H>,
}

impl<'a, H: Host> PolicyBuilder<'a, H> {
    pub fn new(policy: &'a mut DuplicationPolicy<H>) -> Self {
        Self { policy }
    }

    pub fn enable(&mut self) -> &mut Self {
        self.policy.rules.enabled = true;
        self
    }

    pub fn disable(&mut self) -> &mut Self {
        self.policy.rules.enabled = false;
        self
    }

    /// Process `relation`, after any already included. Clears excludes.
    pub fn include_field(&mut self, relation: &str) -> &mut Self {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.excludes.clear();
        self.policy.exclude_conditions.clear();
        self.policy.include_conditions.remove(relation);
        push_unique(&mut rules.includes, relation.to_string());
        self
    }

    /// Like [`include_field`](Self::include_field), but `relation` is only
    /// processed when `condition` holds for the source entity.
    pub fn include_field_if<F>(&mut self, relation: &str, condition: F) -> &mut Self
    where
        F: Fn(&H, &H::Entity) -> Result<bool> + Send + Sync + 'static,
    {
        self.include_field(relation);
        self.policy
            .include_conditions
            .insert(relation, Arc::new(condition));
        self
    }

    /// Process exactly `relations`, in order. Clears excludes.
    pub fn include_fields<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.excludes.clear();
        rules.includes = unique(relations.into_iter().map(Into::into));
        self.policy.exclude_conditions.clear();
        self.policy.include_conditions.clear();
        self
    }

    /// Skip `relation`. Clears includes.
    pub fn exclude_field(&mut self, relation: &str) -> &mut Self {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.includes.clear();
        self.policy.include_conditions.clear();
        self.policy.exclude_conditions.remove(relation);
        push_unique(&mut rules.excludes, relation.to_string());
        self
    }

    /// Like [`exclude_field`](Self::exclude_field), but `relation` is only
    /// skipped when `condition` holds for the source entity.
    pub fn exclude_field_if<F>(&mut self, relation: &str, condition: F) -> &mut Self
    where
        F: Fn(&H, &H::Entity) -> Result<bool> + Send + Sync + 'static,
    {
        self.exclude_field(relation);
        self.policy
            .exclude_conditions
            .insert(relation, Arc::new(condition));
        self
    }

    /// Skip exactly `relations`. Clears includes.
    pub fn exclude_fields<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.includes.clear();
        rules.excludes = unique(relations.into_iter().map(Into::into));
        self.policy.include_conditions.clear();
        self.policy.exclude_conditions.clear();
        self
    }

    /// Deep-copy the children of `relation` instead of re-linking them.
    pub fn clone_field(&mut self, relation: &str) -> &mut Self {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        push_unique(&mut rules.clones, relation.to_string());
        self
    }

    pub fn clone_fields<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.clones = unique(relations.into_iter().map(Into::into));
        self
    }

    pub fn recognize(&mut self, cardinality: Cardinality) -> &mut Self {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        push_unique(&mut rules.recognized, cardinality);
        self
    }

    pub fn recognize_all<I>(&mut self, cardinalities: I) -> &mut Self
    where
        I: IntoIterator<Item = Cardinality>,
    {
        let rules = &mut self.policy.rules;
        rules.enabled = true;
        rules.recognized = unique(cardinalities);
        self
    }

    /// Run `hook` before association processing.
    pub fn before_associations<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut H, &H::Entity, &mut H::Entity) -> Result<()> + Send + Sync + 'static,
    {
        self.policy.before_hooks.push(Arc::new(hook));
        self
    }

    /// Alias of [`before_associations`](Self::before_associations).
    pub fn override_with<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut H, &H::Entity, &mut H::Entity) -> Result<()> + Send + Sync + 'static,
    {
        self.before_associations(hook)
    }

    pub fn before_associations_all<I>(&mut self, hooks: I) -> &mut Self
    where
        I: IntoIterator<Item = Hook<H>>,
    {
        self.policy.before_hooks = unique_hooks(hooks);
        self
    }

    /// Run `hook` after association processing, before field transforms.
    pub fn after_associations<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut H, &H::Entity, &mut H::Entity) -> Result<()> + Send + Sync + 'static,
    {
        self.policy.after_hooks.push(Arc::new(hook));
        self
    }

    /// Alias of [`after_associations`](Self::after_associations).
    pub fn customize<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut H, &H::Entity, &mut H::Entity) -> Result<()> + Send + Sync + 'static,
    {
        self.after_associations(hook)
    }

    pub fn after_associations_all<I>(&mut self, hooks: I) -> &mut Self
    where
        I: IntoIterator<Item = Hook<H>>,
    {
        self.policy.after_hooks = unique_hooks(hooks);
        self
    }

    /// Create the copy with `copier` instead of [`Host::shallow_copy`].
    pub fn copy_with<F>(&mut self, copier: F) -> &mut Self
    where
        F: Fn(&mut H, &H::Entity) -> Result<H::Entity> + Send + Sync + 'static,
    {
        self.policy.copier = Some(Arc::new(copier));
        self
    }

    /// Re-attach copied one-to-many children to the relation `remapper`
    /// names instead of the one they were read from.
    pub fn remap_with<F>(&mut self, remapper: F) -> &mut Self
    where
        F: Fn(&H, &H::Entity, &str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.policy.remapper = Some(Arc::new(remapper));
        self
    }

    /// Pass this policy on to the policies of child types.
    pub fn propagate(&mut self, style: Parenting) -> &mut Self {
        self.policy.parenting = Some(style);
        self
    }

    /// How this type takes a [`Parenting::Relaxed`] parent's settings.
    pub fn raised(&mut self, style: Parenting) -> &mut Self {
        self.policy.raised = Some(style);
        self
    }

    pub fn nullify(&mut self, field: &str) -> &mut Self {
        self.policy.run_preprocessing = true;
        push_unique(&mut self.policy.transforms.null_fields, field.to_string());
        self
    }

    pub fn nullify_all<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.run_preprocessing = true;
        self.policy.transforms.null_fields = unique(fields.into_iter().map(Into::into));
        self
    }

    /// Overwrite `field` with `value`. Only `null` is ignored.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.policy.run_preprocessing = true;
        merge_entry(&mut self.policy.transforms.coercions, field, coercion(value.into()));
        self
    }

    pub fn set_all<I, K, V>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.policy.run_preprocessing = true;
        let map = &mut self.policy.transforms.coercions;
        map.clear();
        for (field, value) in entries {
            merge_entry(map, field, coercion(value.into()));
        }
        self
    }

    /// Put `prefix` in front of `field`. `null` and `false` are ignored.
    pub fn prepend(&mut self, field: &str, prefix: impl Into<Value>) -> &mut Self {
        self.policy.run_preprocessing = true;
        merge_entry(&mut self.policy.transforms.prefixes, field, affix(prefix.into()));
        self
    }

    pub fn prepend_all<I, K, V>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.policy.run_preprocessing = true;
        let map = &mut self.policy.transforms.prefixes;
        map.clear();
        for (field, prefix) in entries {
            merge_entry(map, field, affix(prefix.into()));
        }
        self
    }

    /// Put `suffix` after `field`. `null` and `false` are ignored.
    pub fn append(&mut self, field: &str, suffix: impl Into<Value>) -> &mut Self {
        self.policy.run_preprocessing = true;
        merge_entry(&mut self.policy.transforms.suffixes, field, affix(suffix.into()));
        self
    }

    pub fn append_all<I, K, V>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.policy.run_preprocessing = true;
        let map = &mut self.policy.transforms.suffixes;
        map.clear();
        for (field, suffix) in entries {
            merge_entry(map, field, affix(suffix.into()));
        }
        self
    }

    /// Substitute every match of a pattern in `field`.
    pub fn regex(&mut self, field: &str, rule: impl Into<Option<RegexRule>>) -> &mut Self {
        self.policy.run_preprocessing = true;
        merge_entry(&mut self.policy.transforms.regexes, field, rule.into());
        self
    }

    pub fn regex_all<I, K, R>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: Into<Option<RegexRule>>,
    {
        self.policy.run_preprocessing = true;
        let map = &mut self.policy.transforms.regexes;
        map.clear();
        for (field, rule) in entries {
            merge_entry(map, field, rule.into());
        }
        self
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn unique<T: PartialEq>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut list = Vec::new();
    for value in values {
        push_unique(&mut list, value);
    }
    list
}

fn unique_hooks<H: Host>(hooks: impl IntoIterator<Item = Hook<H>>) -> Vec<Hook<H>> {
    let mut list: Vec<Hook<H>> = Vec::new();
    for hook in hooks {
        if !list.iter().any(|existing| Arc::ptr_eq(existing, &hook)) {
            list.push(hook);
        }
    }
    list
}

fn merge_entry<V>(map: &mut FieldMap<V>, field: impl Into<String>, value: Option<V>) {
    if let Some(value) = value {
        map.insert(field, value);
    }
}

fn coercion(value: Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn affix(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        other => Some(render_text(&other)),
    }
}
