//! Error types for the order form
//!
//! The form itself never fails: every turn ends in an [`Outcome`](crate::form::Outcome).
//! These errors cover the collaborators around it (extraction backends and
//! configuration loading).

use thiserror::Error;

/// Failure of an extraction backend to produce a usable field map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Extraction backend failed: {0}")]
    Backend(String),

    #[error("Malformed extraction output: {reason}")]
    Malformed { reason: String, raw: String },

    #[error("Extraction output is not a JSON object: {0}")]
    NotAnObject(String),
}

impl ExtractionError {
    /// Wrap a collaborator error (LLM transport, API status, ...)
    pub fn backend(err: impl std::fmt::Display) -> Self {
        ExtractionError::Backend(err.to_string())
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
