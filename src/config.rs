//! Form configuration
//!
//! Loads the form definition (fields, validators, menu, language, canned
//! messages, receipt layout) from YAML. The built-in pizza order lives in
//! `config/pizza_order.yaml` and is embedded at compile time.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::menu::Menu;
use crate::record::{FieldExample, FieldSpec, RecordSchema};
use crate::validator::{FieldValidator, DEFAULT_MENU_MESSAGE};

const BUILTIN_PIZZA_ORDER: &str = include_str!("../config/pizza_order.yaml");

/// Root configuration for a slot-filling form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Language generated prose is written in (question writer, LLM prompts)
    #[serde(default = "default_language")]
    pub language: String,
    /// Consecutive no-progress turns before offering to cancel
    #[serde(default = "default_max_no_progress")]
    pub max_no_progress: u32,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub menu: Menu,
    #[serde(default)]
    pub messages: Messages,
    #[serde(default)]
    pub receipt: ReceiptConfig,
}

/// Definition of a single form field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub examples: Vec<FieldExample>,
    /// Regexes with one capture group, used by the pattern extractor
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub question: Option<String>,
}

/// Declarative validator; compiled into a [`FieldValidator`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorConfig {
    #[default]
    NonEmpty,
    /// Value must name a menu item
    Menu {
        #[serde(default)]
        message: Option<String>,
    },
    OneOf {
        values: Vec<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        regex: String,
        message: String,
    },
}

/// Canned replies used by the dialogue driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub rephrase: String,
    pub stalled: String,
    pub cancelled: String,
    pub menu_header: String,
    pub no_active_order: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            rephrase: "Sorry, I did not understand. Could you rephrase your request?".to_string(),
            stalled: "If you no longer want to order, just tell me and I will cancel the order."
                .to_string(),
            cancelled: "Your order has been cancelled.".to_string(),
            menu_header: "The available pizzas are the following:".to_string(),
            no_active_order: "There is no order in progress.".to_string(),
        }
    }
}

/// Output format of the order receipt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptFormat {
    #[default]
    Text,
    Html,
}

/// Layout of the completion receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    pub format: ReceiptFormat,
    pub title: String,
    pub footer: String,
    /// Directory URL holding `pizza0.jpg` .. `pizza6.jpg` (HTML only)
    pub image_base_url: Option<String>,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            format: ReceiptFormat::Text,
            title: "ORDER COMPLETED".to_string(),
            footer: "Thanks for your order!".to_string(),
            image_base_url: None,
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_max_no_progress() -> u32 {
    3
}

fn default_required() -> bool {
    true
}

impl FormConfig {
    /// Built-in pizza order form
    pub fn pizza_default() -> Result<Self, ConfigError> {
        Self::load_from_str(BUILTIN_PIZZA_ORDER)
    }

    /// Load from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::load_from_str(&content)
    }

    /// Load from a YAML string and validate
    pub fn load_from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the prompt language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Structural checks that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_no_progress == 0 {
            return Err(ConfigError::Invalid(
                "max_no_progress must be at least 1".to_string(),
            ));
        }
        for field in &self.fields {
            if matches!(field.validator, ValidatorConfig::Menu { .. }) && self.menu.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "field '{}' validates against the menu but the menu is empty",
                    field.name
                )));
            }
            for pattern in &field.patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "field '{}' has an invalid pattern: {}",
                        field.name, e
                    ))
                })?;
                if regex.captures_len() < 2 {
                    return Err(ConfigError::Invalid(format!(
                        "field '{}' pattern '{}' needs a capture group",
                        field.name, pattern
                    )));
                }
            }
        }
        // Field list and validator regexes are checked while building the schema
        self.schema().map(|_| ())
    }

    /// Compile the field definitions into a record schema
    pub fn schema(&self) -> Result<RecordSchema, ConfigError> {
        let fields = self
            .fields
            .iter()
            .map(|f| self.field_spec(f))
            .collect::<Result<Vec<_>, _>>()?;
        RecordSchema::new(fields)
    }

    fn field_spec(&self, field: &FieldConfig) -> Result<FieldSpec, ConfigError> {
        let validator = match &field.validator {
            ValidatorConfig::NonEmpty => FieldValidator::NonEmpty,
            ValidatorConfig::Menu { message } => FieldValidator::one_of(
                self.menu.names(),
                message.as_deref().unwrap_or(DEFAULT_MENU_MESSAGE),
            ),
            ValidatorConfig::OneOf { values, message } => FieldValidator::one_of(
                values.iter().map(String::as_str),
                message.as_deref().unwrap_or("{value} is not an allowed value"),
            ),
            ValidatorConfig::Pattern { regex, message } => {
                FieldValidator::pattern(regex, message.as_str()).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "field '{}' has an invalid validator regex: {}",
                        field.name, e
                    ))
                })?
            }
        };

        let mut spec = FieldSpec::new(field.name.clone(), validator)
            .with_description(field.description.clone());
        if let Some(label) = &field.label {
            spec = spec.with_label(label.clone());
        }
        if let Some(question) = &field.question {
            spec = spec.with_question(question.clone());
        }
        if !field.required {
            spec = spec.optional();
        }
        spec.examples = field.examples.clone();
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_config_loads() {
        let config = FormConfig::pizza_default().unwrap();
        assert_eq!(config.language, "Italian");
        assert_eq!(config.max_no_progress, 3);
        assert_eq!(config.receipt.format, ReceiptFormat::Html);

        let schema = config.schema().unwrap();
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["pizza_type", "address", "phone"]);
        assert!(schema.fields().iter().all(|f| f.required));
        assert!(config.menu.contains("Margherita"));
    }

    #[test]
    fn test_defaults_applied() {
        let config = FormConfig::load_from_str("fields:\n  - name: phone\n").unwrap();
        assert_eq!(config.language, "English");
        assert_eq!(config.max_no_progress, 3);
        assert!(config.fields[0].required);
        assert_eq!(config.fields[0].validator, ValidatorConfig::NonEmpty);
        assert_eq!(config.messages.menu_header, "The available pizzas are the following:");
    }

    #[test]
    fn test_menu_validator_requires_menu() {
        let yaml = "fields:\n  - name: pizza_type\n    validator:\n      kind: menu\n";
        let err = FormConfig::load_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_pattern_needs_capture_group() {
        let yaml = "fields:\n  - name: phone\n    patterns:\n      - '\\d+'\n";
        let err = FormConfig::load_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("needs a capture group"));
    }

    #[test]
    fn test_bad_validator_regex_rejected() {
        let yaml = "fields:\n  - name: phone\n    validator:\n      kind: pattern\n      regex: '('\n      message: bad\n";
        assert!(FormConfig::load_from_str(yaml).is_err());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let yaml = "fields:\n  - name: phone\n  - name: phone\n";
        assert!(FormConfig::load_from_str(yaml).is_err());
    }

    #[test]
    fn test_zero_no_progress_rejected() {
        let yaml = "max_no_progress: 0\nfields:\n  - name: phone\n";
        assert!(FormConfig::load_from_str(yaml).is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = FormConfig::load_from_str("fields: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_phone_validator_accepts_extracted_formats() {
        let config = FormConfig::pizza_default().unwrap();
        let schema = config.schema().unwrap();
        for phone in ["333123123", "+39 333 123 4567", "333-123-1234"] {
            let record = crate::record::Record::with_values(&schema, [("phone", phone)]);
            assert!(schema.validate(&record).is_ok(), "{} rejected", phone);
        }
        let record = crate::record::Record::with_values(&schema, [("phone", "call me")]);
        assert!(schema.validate(&record).is_err());
    }

    #[test]
    fn test_menu_validator_message() {
        let config = FormConfig::pizza_default().unwrap();
        let schema = config.schema().unwrap();
        let record = crate::record::Record::with_values(&schema, [("pizza_type", "Calzone")]);
        let failure = schema.validate(&record).unwrap_err();
        assert_eq!(failure.field, "pizza_type");
        assert_eq!(failure.message, "Calzone is not present in the menu");
    }
}
