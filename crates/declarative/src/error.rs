//! Error types for declarative state handling

use crate::types::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for declarative operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading, writing or persisting resource state.
#[derive(Debug, Error)]
pub enum Error {
    /// Write to an attribute the schema does not declare
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),

    /// Value does not fit the attribute's declared type
    #[error("invalid value for {key:?}: {message}")]
    InvalidValue {
        /// Attribute name
        key: String,
        /// What was wrong
        message: String,
    },

    /// Several attribute writes failed during a single pack
    #[error("failed saving state: {}", join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Declared configuration failed schema validation
    #[error("invalid configuration:\n{}", join_diagnostics(.0))]
    Validation(Vec<Diagnostic>),

    /// Resource type is not in the resource table
    #[error("unsupported resource type {0:?}")]
    UnknownResourceType(String),

    /// Operation was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,

    /// State file could not be read or written
    #[error("state file {path}: {source}")]
    Io {
        /// Path of the state file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// State file is not valid JSON
    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid value error.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Collapse a list of errors: none → `Ok`, otherwise one aggregate.
    pub fn aggregate(errors: Vec<Error>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::Aggregate(errors))
        }
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}
