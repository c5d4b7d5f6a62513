//! Field validators
//!
//! Each form field carries one [`FieldValidator`]. Validators only ever see
//! non-empty values: an absent or blank value means "not provided yet" and is
//! vacuously valid. The whole proposed record is passed alongside the value so
//! a validator can enforce cross-field rules.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::record::Record;

/// Placeholder replaced by the offending value in validator messages
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Default message for menu membership failures
pub const DEFAULT_MENU_MESSAGE: &str = "{value} is not present in the menu";

/// Signature of a custom validation rule
pub type ValidatorFn = Arc<dyn Fn(&str, &Record) -> Result<(), String> + Send + Sync>;

/// A field that failed validation, with the user-facing reason
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

/// Validation rule attached to a single field
#[derive(Clone, Default)]
pub enum FieldValidator {
    /// Any non-empty value is accepted
    #[default]
    NonEmpty,
    /// Value must be one of an enumerated set (exact match)
    OneOf { allowed: Vec<String>, message: String },
    /// Value must match a regular expression
    Pattern { regex: Regex, message: String },
    /// Arbitrary rule over the value and the proposed record
    Custom(ValidatorFn),
}

impl FieldValidator {
    /// Membership in an enumerated set, e.g. the menu
    pub fn one_of<I, S>(allowed: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValidator::OneOf {
            allowed: allowed.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Regex rule; the pattern is anchored by the caller if needed
    pub fn pattern(regex: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(FieldValidator::Pattern {
            regex: Regex::new(regex)?,
            message: message.into(),
        })
    }

    pub fn custom<F>(rule: F) -> Self
    where
        F: Fn(&str, &Record) -> Result<(), String> + Send + Sync + 'static,
    {
        FieldValidator::Custom(Arc::new(rule))
    }

    /// Check a non-empty value against this rule
    pub fn check(&self, value: &str, record: &Record) -> Result<(), String> {
        match self {
            FieldValidator::NonEmpty => Ok(()),
            FieldValidator::OneOf { allowed, message } => {
                if allowed.iter().any(|a| a == value) {
                    Ok(())
                } else {
                    Err(render_message(message, value))
                }
            }
            FieldValidator::Pattern { regex, message } => {
                if regex.is_match(value) {
                    Ok(())
                } else {
                    Err(render_message(message, value))
                }
            }
            FieldValidator::Custom(rule) => rule(value, record),
        }
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValidator::NonEmpty => write!(f, "NonEmpty"),
            FieldValidator::OneOf { allowed, .. } => {
                f.debug_struct("OneOf").field("allowed", allowed).finish()
            }
            FieldValidator::Pattern { regex, .. } => f
                .debug_struct("Pattern")
                .field("regex", &regex.as_str())
                .finish(),
            FieldValidator::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

fn render_message(template: &str, value: &str) -> String {
    template.replace(VALUE_PLACEHOLDER, value)
}
