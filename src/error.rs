//! Error types for loading and validating estimate documents.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A field in the estimate document failed validation.
///
/// `field` is a path into the document such as `lines[3].unit_cost`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }

    pub fn wrong_type(field: impl Into<String>, expected: &str, found: &serde_json::Value) -> Self {
        Self::new(
            field,
            format!("expected {}, found {}", expected, JsonKind(found)),
        )
    }
}

/// Errors that can occur when loading an estimate document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read the document from disk.
    #[error("failed to read file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid JSON.
    #[error("malformed JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// The JSON is well formed but does not describe a valid estimate.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

struct JsonKind<'a>(&'a serde_json::Value);

impl fmt::Display for JsonKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use serde_json::Value;
        let kind = match self.0 {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        write!(f, "{}", kind)
    }
}
