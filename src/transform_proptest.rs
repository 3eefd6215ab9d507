//! Property-based tests for the field transform pipeline.
//!
//! These tests use proptest to generate random field values and rules and
//! verify that the pipeline ordering invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::store::{MemoryStore, RecordId};
    use crate::transform::{render_text, FieldMap, FieldTransforms, RegexRule};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn record(value: &str) -> (MemoryStore, RecordId) {
        let mut store = MemoryStore::new();
        let id = store
            .insert("post", json!({ "name": value }))
            .expect("insert record");
        (store, id)
    }

    fn run(transforms: &FieldTransforms, value: &str) -> Value {
        let (mut store, mut id) = record(value);
        transforms.apply(&mut store, &mut id).expect("apply transforms");
        store.field(id, "name").expect("read field")
    }

    // ============================================================================
    // render_text property tests
    // ============================================================================

    proptest! {
        /// Property: strings render verbatim
        #[test]
        fn render_text_keeps_strings(input in ".*") {
            prop_assert_eq!(render_text(&json!(input.clone())), input);
        }

        /// Property: integers render as their decimal form
        #[test]
        fn render_text_renders_integers(n in any::<i64>()) {
            prop_assert_eq!(render_text(&json!(n)), n.to_string());
        }
    }

    // ============================================================================
    // Pipeline ordering property tests
    // ============================================================================

    proptest! {
        /// Property: prefix and suffix wrap the current value
        #[test]
        fn affixes_wrap_value(
            value in "[a-zA-Z0-9 ]*",
            prefix in "[a-zA-Z0-9-]{0,8}",
            suffix in "[a-zA-Z0-9-]{0,8}"
        ) {
            let transforms = FieldTransforms {
                prefixes: [("name", prefix.clone())].into_iter().collect(),
                suffixes: [("name", suffix.clone())].into_iter().collect(),
                ..Default::default()
            };

            let result = run(&transforms, &value);
            prop_assert_eq!(result, json!(format!("{prefix}{value}{suffix}")));
        }

        /// Property: coercion happens before prefixing, whatever the original value
        #[test]
        fn coercion_precedes_prefix(
            value in "[a-zA-Z0-9 ]*",
            coerced in "[a-zA-Z0-9]{1,8}",
            prefix in "[a-zA-Z0-9-]{1,8}"
        ) {
            let transforms = FieldTransforms {
                coercions: [("name", json!(coerced.clone()))].into_iter().collect(),
                prefixes: [("name", prefix.clone())].into_iter().collect(),
                ..Default::default()
            };

            let result = run(&transforms, &value);
            prop_assert_eq!(result, json!(format!("{prefix}{coerced}")));
        }

        /// Property: a nullified field only carries what later stages add
        #[test]
        fn nullify_precedes_suffix(value in ".*", suffix in "[a-z]{0,8}") {
            let transforms = FieldTransforms {
                null_fields: vec!["name".to_string()],
                suffixes: [("name", suffix.clone())].into_iter().collect(),
                ..Default::default()
            };

            let result = run(&transforms, &value);
            prop_assert_eq!(result, json!(suffix));
        }

        /// Property: the regex stage sees the suffixed value
        #[test]
        fn regex_sees_suffix(value in "[a-z]{0,10}") {
            let transforms = FieldTransforms {
                suffixes: [("name", "@old.com".to_string())].into_iter().collect(),
                regexes: [("name", RegexRule::new(r"@old\.com$", "@new.com"))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            };

            let result = run(&transforms, &value);
            prop_assert_eq!(result, json!(format!("{value}@new.com")));
        }

        /// Property: after substituting a literal, no occurrence of it remains
        #[test]
        fn regex_replaces_every_occurrence(value in "[abc]{0,20}") {
            let transforms = FieldTransforms {
                regexes: [("name", RegexRule::new("a", "x"))].into_iter().collect(),
                ..Default::default()
            };

            let result = run(&transforms, &value);
            prop_assert_eq!(result, json!(value.replace('a', "x")));
        }
    }

    // ============================================================================
    // FieldMap property tests
    // ============================================================================

    proptest! {
        /// Property: a FieldMap keeps one entry per key, in first-seen order,
        /// holding the last value inserted for that key
        #[test]
        fn field_map_keeps_first_position_and_last_value(
            entries in prop::collection::vec(("[a-d]", any::<u8>()), 0..20)
        ) {
            let map: FieldMap<u8> = entries.iter().cloned().collect();

            let mut order: Vec<String> = Vec::new();
            for (key, _) in &entries {
                if !order.contains(key) {
                    order.push(key.clone());
                }
            }
            prop_assert_eq!(map.keys().collect::<Vec<_>>(), order.iter().map(String::as_str).collect::<Vec<_>>());

            for key in &order {
                let last = entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| *v);
                prop_assert_eq!(map.get(key).copied(), last);
            }
        }
    }
}
