//! Schema load errors

use thiserror::Error;

/// A schema document that cannot be turned into a field model.
///
/// Unrecoverable for the load that produced it: callers fall back to the
/// last good model or to an empty input form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Malformed schema at '{location}': {reason}")]
    Malformed { location: String, reason: String },

    #[error("Schema document defines no types")]
    NoDefinitions,

    #[error("Dangling reference: '{name}' is not defined")]
    DanglingReference { name: String },

    #[error("Root type '{name}' not found in schema document")]
    UnknownRoot { name: String },

    #[error("Root type '{name}' must be an object, found {found}")]
    NonObjectRoot { name: String, found: String },

    #[error("Root type '{name}' only refers back to itself")]
    CyclicRoot { name: String },
}

impl SchemaError {
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
