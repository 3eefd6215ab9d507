//! Scalar field rewrites applied to a duplication result.
//!
//! [`FieldTransforms`] holds five kinds of rules and [`FieldTransforms::apply`]
//! runs them as a pipeline, each stage seeing the output of the previous one:
//!
//! 1. nullify
//! 2. coerce
//! 3. prefix
//! 4. suffix
//! 5. regex substitution
//!
//! The same field may appear in several stages; it is rewritten in that order.

use crate::error::{Error, Result};
use crate::host::Host;
use log::trace;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

/// An insertion-ordered map from field name to a rule value.
///
/// Re-inserting an existing field replaces its value but keeps its original
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for FieldMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> FieldMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `field`, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: V) -> Option<V> {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((field, value));
                None
            }
        }
    }

    /// Remove `field`, returning its value if present.
    pub fn remove(&mut self, field: &str) -> Option<V> {
        let index = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, field: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Iterate over `(field, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for FieldMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (field, value) in iter {
            map.insert(field, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for FieldMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for FieldMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for FieldMapVisitor<V> {
            type Value = FieldMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from field name to value")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = FieldMap::new();
                while let Some((field, value)) = access.next_entry::<String, V>()? {
                    map.insert(field, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// A pattern substitution for one field.
///
/// The pattern is compiled on first use and kept with the rule.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegexRule {
    /// Regular expression matched against the field's current text.
    pattern: String,
    /// Replacement for every match; may reference groups as `$1`, `$name`.
    replacement: String,
    #[serde(skip)]
    compiled: OnceLock<Regex>,
}

impl RegexRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// The compiled pattern, built once per rule.
    pub fn regex(&self) -> Result<&Regex> {
        if let Some(regex) = self.compiled.get() {
            return Ok(regex);
        }
        let regex = Regex::new(&self.pattern).map_err(Error::Regex)?;
        Ok(self.compiled.get_or_init(|| regex))
    }
}

impl PartialEq for RegexRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.replacement == other.replacement
    }
}

impl Eq for RegexRule {}

impl fmt::Debug for RegexRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexRule")
            .field("pattern", &self.pattern)
            .field("replacement", &self.replacement)
            .finish()
    }
}

/// The ordered set of field rewrites of one policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldTransforms {
    #[serde(default)]
    pub null_fields: Vec<String>,
    #[serde(default)]
    pub coercions: FieldMap<Value>,
    #[serde(default)]
    pub prefixes: FieldMap<String>,
    #[serde(default)]
    pub suffixes: FieldMap<String>,
    #[serde(default)]
    pub regexes: FieldMap<RegexRule>,
}

impl FieldTransforms {
    /// True when no stage has any rule.
    pub fn is_empty(&self) -> bool {
        self.null_fields.is_empty()
            && self.coercions.is_empty()
            && self.prefixes.is_empty()
            && self.suffixes.is_empty()
            && self.regexes.is_empty()
    }

    /// Check that every regex rule compiles.
    pub fn validate(&self) -> Result<()> {
        for (_, rule) in self.regexes.iter() {
            rule.regex()?;
        }
        Ok(())
    }

    /// Run the pipeline against `entity`.
    ///
    /// Whether a coerced field holds text is decided before any stage runs,
    /// so nullifying a field first does not change how its coercion is
    /// written.
    pub fn apply<H: Host>(&self, host: &mut H, entity: &mut H::Entity) -> Result<()> {
        let textual = self
            .coercions
            .keys()
            .map(|field| host.is_text_field(entity, field))
            .collect::<Result<Vec<bool>>>()?;

        for field in &self.null_fields {
            trace!("nullify {}", field);
            host.set_field(entity, field, Value::Null)?;
        }

        for ((field, value), is_text) in self.coercions.iter().zip(textual) {
            let value = if is_text {
                Value::String(render_text(value))
            } else {
                value.clone()
            };
            trace!("coerce {} = {}", field, value);
            host.set_field(entity, field, value)?;
        }

        for (field, prefix) in self.prefixes.iter() {
            let current = render_text(&host.get_field(entity, field)?);
            host.set_field(entity, field, Value::String(format!("{prefix}{current}")))?;
        }

        for (field, suffix) in self.suffixes.iter() {
            let current = render_text(&host.get_field(entity, field)?);
            host.set_field(entity, field, Value::String(format!("{current}{suffix}")))?;
        }

        for (field, rule) in self.regexes.iter() {
            let regex = rule.regex()?;
            // Only text is substituted.
            if let Value::String(current) = host.get_field(entity, field)? {
                let replaced = regex.replace_all(&current, rule.replacement.as_str());
                host.set_field(entity, field, Value::String(replaced.into_owned()))?;
            }
        }

        Ok(())
    }
}

/// Render a field value as text for concatenation.
///
/// `null` renders as the empty string and strings verbatim; everything else
/// uses its JSON form.
///
/// # Examples
///
/// ```
/// use deep_dup::transform::render_text;
/// use serde_json::json;
///
/// assert_eq!(render_text(&json!(null)), "");
/// assert_eq!(render_text(&json!("draft")), "draft");
/// assert_eq!(render_text(&json!(42)), "42");
/// assert_eq!(render_text(&json!(false)), "false");
/// ```
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store_with(fields: Value) -> (MemoryStore, crate::store::RecordId) {
        let mut store = MemoryStore::new();
        let id = store.insert("post", fields).unwrap();
        (store, id)
    }

    mod field_map_tests {
        use super::*;

        #[test]
        fn test_insert_keeps_first_position() {
            let mut map = FieldMap::new();
            map.insert("title", 1);
            map.insert("slug", 2);
            assert_eq!(map.insert("title", 3), Some(1));

            let entries: Vec<_> = map.iter().collect();
            assert_eq!(entries, vec![("title", &3), ("slug", &2)]);
        }

        #[test]
        fn test_from_iterator_later_entries_win() {
            let map: FieldMap<&str> = vec![("a", "x"), ("b", "y"), ("a", "z")]
                .into_iter()
                .collect();
            assert_eq!(map.len(), 2);
            assert_eq!(map.get("a"), Some(&"z"));
            assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        }

        #[test]
        fn test_remove_keeps_remaining_order() {
            let mut map: FieldMap<i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
            assert_eq!(map.remove("b"), Some(2));
            assert_eq!(map.remove("b"), None);
            assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        }

        #[test]
        fn test_yaml_preserves_order() {
            let yaml = "zeta: 1\nalpha: 2\nmid: 3\n";
            let map: FieldMap<i64> = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(map.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);

            let back = serde_yaml::to_string(&map).unwrap();
            assert_eq!(back, yaml);
        }
    }

    mod pipeline_tests {
        use super::*;

        #[test]
        fn test_nullify() {
            let (mut store, mut id) = store_with(json!({"title": "A", "published_at": 10}));
            let transforms = FieldTransforms {
                null_fields: vec!["published_at".into()],
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "published_at").unwrap(), Value::Null);
            assert_eq!(store.field(id, "title").unwrap(), json!("A"));
        }

        #[test]
        fn test_coerce_stringifies_text_fields_only() {
            let (mut store, mut id) =
                store_with(json!({"title": "A", "views": 12, "published": true}));
            let transforms = FieldTransforms {
                coercions: vec![
                    ("title", json!(7)),
                    ("views", json!(0)),
                    ("published", json!(false)),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "title").unwrap(), json!("7"));
            assert_eq!(store.field(id, "views").unwrap(), json!(0));
            assert_eq!(store.field(id, "published").unwrap(), json!(false));
        }

        #[test]
        fn test_coerce_after_nullify_keeps_text_type() {
            let (mut store, mut id) = store_with(json!({"title": "A", "views": 12}));
            let transforms = FieldTransforms {
                null_fields: vec!["title".into(), "views".into()],
                coercions: [("title", json!(5)), ("views", json!(0))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "title").unwrap(), json!("5"));
            assert_eq!(store.field(id, "views").unwrap(), json!(0));
        }

        #[test]
        fn test_prefix_sees_coerced_value() {
            let (mut store, mut id) = store_with(json!({"name": "original"}));
            let transforms = FieldTransforms {
                coercions: [("name", json!("X"))].into_iter().collect(),
                prefixes: [("name", "P-".to_string())].into_iter().collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "name").unwrap(), json!("P-X"));
        }

        #[test]
        fn test_prefix_and_suffix_on_null_field() {
            let (mut store, mut id) = store_with(json!({"title": "A"}));
            let transforms = FieldTransforms {
                null_fields: vec!["title".into()],
                prefixes: [("title", "[".to_string())].into_iter().collect(),
                suffixes: [("title", "]".to_string())].into_iter().collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "title").unwrap(), json!("[]"));
        }

        #[test]
        fn test_suffix_renders_numbers() {
            let (mut store, mut id) = store_with(json!({"revision": 3}));
            let transforms = FieldTransforms {
                suffixes: [("revision", "-copy".to_string())].into_iter().collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "revision").unwrap(), json!("3-copy"));
        }

        #[test]
        fn test_regex_replaces_all_matches() {
            let (mut store, mut id) = store_with(json!({"email": "a@old.com, b@old.com"}));
            let transforms = FieldTransforms {
                regexes: [("email", RegexRule::new(r"@old\.com", "@new.com"))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(
                store.field(id, "email").unwrap(),
                json!("a@new.com, b@new.com")
            );
        }

        #[test]
        fn test_regex_capture_groups() {
            let (mut store, mut id) = store_with(json!({"slug": "post-12"}));
            let transforms = FieldTransforms {
                regexes: [("slug", RegexRule::new(r"^(\w+)-(\d+)$", "$1-copy-$2"))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "slug").unwrap(), json!("post-copy-12"));
        }

        #[test]
        fn test_regex_skips_non_text() {
            let (mut store, mut id) = store_with(json!({"views": 12}));
            let transforms = FieldTransforms {
                regexes: [("views", RegexRule::new("1", "9"))].into_iter().collect(),
                ..Default::default()
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "views").unwrap(), json!(12));
        }

        #[test]
        fn test_full_pipeline_order() {
            let (mut store, mut id) = store_with(json!({"title": "Draft", "slug": "x"}));
            let transforms = FieldTransforms {
                null_fields: vec!["title".into()],
                coercions: [("title", json!("Report"))].into_iter().collect(),
                prefixes: [("title", "Copy of ".to_string())].into_iter().collect(),
                suffixes: [("title", " (2)".to_string())].into_iter().collect(),
                regexes: [("title", RegexRule::new("Report", "Summary"))]
                    .into_iter()
                    .collect(),
            };

            transforms.apply(&mut store, &mut id).unwrap();

            assert_eq!(store.field(id, "title").unwrap(), json!("Copy of Summary (2)"));
            assert_eq!(store.field(id, "slug").unwrap(), json!("x"));
        }

        #[test]
        fn test_invalid_regex_fails() {
            let (mut store, mut id) = store_with(json!({"title": "A"}));
            let transforms = FieldTransforms {
                regexes: [("title", RegexRule::new("(", ""))].into_iter().collect(),
                ..Default::default()
            };

            assert!(transforms.validate().is_err());
            let err = transforms.apply(&mut store, &mut id).unwrap_err();
            assert!(matches!(err, Error::Regex(_)));
        }

        #[test]
        fn test_regex_is_compiled_once() {
            let rule = RegexRule::new(r"\d+", "n");
            let first = rule.regex().unwrap();
            let second = rule.regex().unwrap();
            assert!(std::ptr::eq(first, second));

            let copy = rule.clone();
            assert_eq!(copy, rule);
            assert_eq!(copy.regex().unwrap().as_str(), r"\d+");
        }

        #[test]
        fn test_failed_compile_is_not_cached() {
            let rule = RegexRule::new("(", "");
            assert!(matches!(rule.regex(), Err(Error::Regex(_))));
            assert!(matches!(rule.regex(), Err(Error::Regex(_))));
        }

        #[test]
        fn test_rule_equality_ignores_compiled_state() {
            let compiled = RegexRule::new("a", "b");
            compiled.regex().unwrap();
            assert_eq!(compiled, RegexRule::new("a", "b"));
            assert_ne!(compiled, RegexRule::new("a", "c"));
            assert_eq!(
                format!("{:?}", compiled),
                "RegexRule { pattern: \"a\", replacement: \"b\" }"
            );
        }

        #[test]
        fn test_is_empty() {
            assert!(FieldTransforms::default().is_empty());
            let transforms = FieldTransforms {
                null_fields: vec!["x".into()],
                ..Default::default()
            };
            assert!(!transforms.is_empty());
        }
    }
}
