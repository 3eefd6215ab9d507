//! # Policy Documents
//!
//! Policies can be declared in YAML instead of code. A document is a mapping
//! from entity type to that type's settings:
//!
//! ```yaml
//! post:
//!   include: [comments, tags]
//!   clone: [tags]
//!   nullify: [published_at]
//!   set: { status: draft, views: 0 }
//!   prepend: { title: "Copy of " }
//!   append: { slug: "-copy" }
//!   regex:
//!     email: { pattern: '@old\.com', replacement: "@new.com" }
//! comment:
//!   exclude: [votes]
//! report:
//!   propagate: submissive
//! ```
//!
//! Every key maps onto one [`PolicyBuilder`] call in its bulk form, so a key
//! present in the document replaces whatever the policy held for it before.
//! Keys are applied in a fixed order with `enabled` last, which lets a
//! document switch association processing off while still listing relations.
//!
//! The same falsy rules as the builder apply: `null` and `false` entries under
//! `prepend`, `append` and `regex` are dropped, while `set` keeps everything
//! except `null`.
//!
//! Hooks, copy primitives, remappers and include or exclude conditions are
//! code and can only be set through the builder.

use crate::association::Cardinality;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::policy::{DuplicationPolicy, Parenting, PolicyBuilder};
use crate::transform::{FieldMap, RegexRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Settings for one entity type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognize: Option<Vec<Cardinality>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullify: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<FieldMap<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepend: Option<FieldMap<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<FieldMap<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<FieldMap<Option<RegexRule>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<Parenting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised: Option<Parenting>,
}

/// A parsed policy document, keyed by entity type
pub type PolicyDocument = BTreeMap<String, PolicySettings>;

impl PolicySettings {
    /// Apply these settings through `builder`
    pub fn apply<H: Host>(&self, builder: &mut PolicyBuilder<'_, H>) {
        // An empty list would still clear its counterpart, so it is skipped.
        if let Some(include) = self.include.as_ref().filter(|l| !l.is_empty()) {
            builder.include_fields(include.iter().cloned());
        }
        if let Some(exclude) = self.exclude.as_ref().filter(|l| !l.is_empty()) {
            builder.exclude_fields(exclude.iter().cloned());
        }
        if let Some(clone) = &self.clone {
            builder.clone_fields(clone.iter().cloned());
        }
        if let Some(recognize) = &self.recognize {
            builder.recognize_all(recognize.iter().copied());
        }
        if let Some(nullify) = &self.nullify {
            builder.nullify_all(nullify.iter().cloned());
        }
        if let Some(set) = &self.set {
            builder.set_all(set.iter().map(|(field, value)| (field, value.clone())));
        }
        if let Some(prepend) = &self.prepend {
            builder.prepend_all(prepend.iter().map(|(field, value)| (field, value.clone())));
        }
        if let Some(append) = &self.append {
            builder.append_all(append.iter().map(|(field, value)| (field, value.clone())));
        }
        if let Some(regex) = &self.regex {
            builder.regex_all(regex.iter().map(|(field, rule)| (field, rule.clone())));
        }
        if let Some(style) = self.propagate {
            builder.propagate(style);
        }
        if let Some(style) = self.raised {
            builder.raised(style);
        }
        match self.enabled {
            Some(true) => {
                builder.enable();
            }
            Some(false) => {
                builder.disable();
            }
            None => {}
        }
    }

    /// Settings that reproduce the data part of `policy` (hooks are not
    /// representable and are left out)
    pub fn from_policy<H: Host>(policy: &DuplicationPolicy<H>) -> Self {
        fn non_empty<T: Clone>(list: &[T]) -> Option<Vec<T>> {
            (!list.is_empty()).then(|| list.to_vec())
        }

        let transforms = policy.transforms();
        let as_values = |map: &FieldMap<String>| -> Option<FieldMap<Value>> {
            (!map.is_empty()).then(|| {
                map.iter()
                    .map(|(field, text)| (field, Value::String(text.clone())))
                    .collect()
            })
        };

        Self {
            enabled: Some(policy.is_enabled()),
            include: non_empty(policy.includes()),
            exclude: non_empty(policy.excludes()),
            clone: non_empty(policy.clones()),
            recognize: Some(policy.recognized().to_vec()),
            nullify: non_empty(&transforms.null_fields),
            set: (!transforms.coercions.is_empty()).then(|| transforms.coercions.clone()),
            prepend: as_values(&transforms.prefixes),
            append: as_values(&transforms.suffixes),
            regex: (!transforms.regexes.is_empty()).then(|| {
                transforms
                    .regexes
                    .iter()
                    .map(|(field, rule)| (field, Some(rule.clone())))
                    .collect()
            }),
            propagate: policy.parenting(),
            raised: policy.raised(),
        }
    }

    fn check(&self, entity_type: &str) -> Result<()> {
        let populated = |list: &Option<Vec<String>>| list.as_ref().is_some_and(|l| !l.is_empty());
        if populated(&self.include) && populated(&self.exclude) {
            return Err(Error::ConfigParse {
                message: format!("'{}' declares both include and exclude", entity_type),
                hint: Some(
                    "include and exclude are mutually exclusive; keep only one of them"
                        .to_string(),
                ),
            });
        }
        Ok(())
    }
}

/// Parses a YAML string into a `PolicyDocument`.
///
/// An empty document yields no policies.
pub fn parse(yaml_content: &str) -> Result<PolicyDocument> {
    if yaml_content.trim().is_empty() {
        return Ok(PolicyDocument::new());
    }

    let document: PolicyDocument = serde_yaml::from_str(yaml_content).map_err(Error::Yaml)?;
    for (entity_type, settings) in &document {
        settings.check(entity_type)?;
    }
    Ok(document)
}

/// Render a document back to YAML
pub fn render(document: &PolicyDocument) -> Result<String> {
    serde_yaml::to_string(document).map_err(Error::Yaml)
}
