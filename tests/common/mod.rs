//! Shared test utilities for integration tests.
//!
//! This module provides the blog fixture used across test files: a
//! [`MemoryStore`] schema with every relation shape the engine handles, and a
//! seeded post.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = BlogFixture::new();
//!     // ... test code
//! }
//! ```

use deep_dup::store::{MemoryStore, RecordId};
use deep_dup::{Duplicator, PolicyRegistry};
use serde_json::json;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use super::policies;
    pub use super::{BlogFixture, Registry};
    pub use deep_dup::store::{MemoryStore, RecordId};
    pub use deep_dup::{DuplicateOptions, Duplicator, Error};
    pub use serde_json::json;
}

/// Registry type used throughout the tests.
pub type Registry = PolicyRegistry<MemoryStore>;

/// Common policy documents for testing.
#[allow(dead_code)]
pub mod policies {
    /// Deep-clone tags, relink comments, retitle the copy.
    pub const BLOG: &str = r#"
post:
  include: [comments, tags]
  clone: [tags]
  nullify: [published_at]
  set: { status: draft }
  prepend: { title: "Copy of " }
  regex:
    author_email: { pattern: '@old\.com', replacement: "@new.com" }
comment:
  append: { body: " (copied)" }
"#;

    /// Include and exclude together, which is rejected.
    pub const CONTRADICTORY: &str = r#"
post:
  include: [comments]
  exclude: [tags]
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "post: [unclosed";
}

/// A store holding one post with a header, two comments, two tags (through
/// taggings) and one category.
pub struct BlogFixture {
    pub store: MemoryStore,
    pub post: RecordId,
}

impl BlogFixture {
    /// Build the schema and seed the post.
    pub fn new() -> Self {
        let mut store = MemoryStore::new();
        store
            .define("post")
            .has_one("header", "header", "post_id")
            .has_many("comments", "comment", "post_id")
            .has_many("taggings", "tagging", "post_id")
            .through("tags", "tag", "taggings", "tag_id")
            .many_to_many("categories", "category", "categories_posts");
        for entity_type in ["header", "comment", "tagging", "tag", "category"] {
            store.define(entity_type);
        }

        let post = store
            .insert(
                "post",
                json!({
                    "title": "Hello",
                    "status": "published",
                    "published_at": 1_700_000_000,
                    "author_email": "ada@old.com",
                }),
            )
            .expect("Failed to insert post");

        let header = store
            .insert("header", json!({"text": "banner"}))
            .expect("Failed to insert header");
        store
            .link(post, "header", header)
            .expect("Failed to link header");

        for body in ["first", "second"] {
            let comment = store
                .insert("comment", json!({ "body": body }))
                .expect("Failed to insert comment");
            store
                .link(post, "comments", comment)
                .expect("Failed to link comment");
        }

        for name in ["rust", "databases"] {
            let tag = store
                .insert("tag", json!({ "name": name }))
                .expect("Failed to insert tag");
            store.link(post, "tags", tag).expect("Failed to link tag");
        }

        let category = store
            .insert("category", json!({"name": "news"}))
            .expect("Failed to insert category");
        store
            .link(post, "categories", category)
            .expect("Failed to link category");

        Self { store, post }
    }

    /// Duplicate the post with `registry`.
    pub fn duplicate(&mut self, registry: &Registry) -> deep_dup::Result<RecordId> {
        Duplicator::new(registry).duplicate(&mut self.store, &self.post)
    }

    /// Ids related to `owner` through `relation`.
    pub fn related(&self, owner: RecordId, relation: &str) -> Vec<RecordId> {
        self.store
            .related(owner, relation)
            .expect("Failed to read relation")
    }

    /// A field of a record.
    pub fn field(&self, id: RecordId, name: &str) -> serde_json::Value {
        self.store.field(id, name).expect("Failed to read field")
    }
}

impl Default for BlogFixture {
    fn default() -> Self {
        Self::new()
    }
}

