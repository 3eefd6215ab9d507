//! # Error Handling
//!
//! This module defines the centralized error type for `deep-dup`. It uses the
//! `thiserror` library to derive a single `Error` enum that covers every
//! failure a duplication can surface, together with a `Result<T>` alias used
//! throughout the crate.
//!
//! The variants fall into four groups:
//!
//! - **Configuration**: malformed policy documents (`ConfigParse`) and
//!   policies whose settings cannot be executed (`InvalidPolicy`).
//! - **Resolution**: relation names that do not exist on the entity type
//!   (`UnknownAssociation`).
//! - **Host layer**: failures raised by a [`Host`](crate::host::Host)
//!   implementation (`UnknownEntity`, `UnknownEntityType`, `Host`). The engine
//!   propagates them unchanged and never retries.
//! - **Traversal guards**: `CycleDetected` and `DepthExceeded`, raised before
//!   a recursive copy would loop forever.
//!
//! Relations whose cardinality is not recognized by a policy are *not* an
//! error; the resolver skips them.

use thiserror::Error;

/// Main error type for duplication operations
#[derive(Error, Debug)]
pub enum Error {
    /// A policy document could not be parsed or contains contradictory
    /// settings.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A policy was rejected after configuration, e.g. a regex rule whose
    /// pattern does not compile.
    #[error("Invalid policy for '{entity_type}': {message}")]
    InvalidPolicy {
        entity_type: String,
        message: String,
    },

    /// A relation named by `include`, `exclude` or `clone` does not exist on
    /// the entity type.
    #[error("Unknown association '{name}' on entity type '{entity_type}'")]
    UnknownAssociation { entity_type: String, name: String },

    /// The host layer has no record for the given entity handle.
    #[error("Unknown entity: {entity}")]
    UnknownEntity { entity: String },

    /// The host layer does not know the given entity type.
    #[error("Unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: String },

    /// Any other failure reported by the host persistence layer.
    #[error("Host layer error: {message}")]
    Host { message: String },

    /// The same source entity was reached again along its own ancestry path.
    #[error("Cycle detected while duplicating: {cycle}")]
    CycleDetected { cycle: String },

    /// Recursion went deeper than the configured limit.
    #[error("Duplication exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
