//! Record model
//!
//! A [`RecordSchema`] is the ordered list of field descriptors declared when
//! the form is defined: name, required-ness, validator, and the prose used
//! by extraction and question backends. A [`Record`] is one in-progress set of
//! values laid out in that same order.
//!
//! ```text
//! RecordSchema
//! ├── pizza_type  (required, menu validator)
//! ├── address     (required)
//! └── phone       (required, pattern validator)
//!
//! Record { pizza_type: Some("Margherita"), address: None, phone: None }
//! ```

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;
use crate::extraction::CandidateFields;
use crate::validator::{FieldValidator, ValidationFailure};

/// True for values that count as "not provided": absent or blank
pub fn is_empty_value(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Example utterance paired with the value it should yield
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldExample {
    pub text: String,
    pub value: String,
}

/// Descriptor for one slot of the record
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Human phrasing of the field, used instead of the raw identifier
    pub label: String,
    pub description: String,
    pub required: bool,
    pub validator: FieldValidator,
    pub examples: Vec<FieldExample>,
    /// Question asked when this field is the next one missing
    pub question: Option<String>,
}

impl FieldSpec {
    /// Required field whose label is derived from its name
    pub fn new(name: impl Into<String>, validator: FieldValidator) -> Self {
        let name = name.into();
        let label = name.replace('_', " ");
        Self {
            name,
            label,
            description: String::new(),
            required: true,
            validator,
            examples: Vec::new(),
            question: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_example(mut self, text: impl Into<String>, value: impl Into<String>) -> Self {
        self.examples.push(FieldExample {
            text: text.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }
}

/// Ordered field descriptors; declaration order drives every iteration
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ConfigError> {
        if fields.is_empty() {
            return Err(ConfigError::Invalid(
                "a form needs at least one field".to_string(),
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "field #{} has an empty name",
                    i + 1
                )));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Run every validator over `record` in declaration order.
    /// Returns the first failure; empty values are skipped.
    pub fn validate(&self, record: &Record) -> Result<(), ValidationFailure> {
        for field in &self.fields {
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            if let Err(message) = field.validator.check(value, record) {
                return Err(ValidationFailure {
                    field: field.name.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    /// Every required field holds a non-empty value
    pub fn is_complete(&self, record: &Record) -> bool {
        self.required_fields().all(|f| record.is_filled(&f.name))
    }

    /// Required fields still empty, in declaration order
    pub fn missing_required(&self, record: &Record) -> Vec<String> {
        self.required_fields()
            .filter(|f| !record.is_filled(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// All fields (required or optional) still empty, in declaration order
    pub fn missing(&self, record: &Record) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !record.is_filled(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }
}

/// One set of slot values, ordered as declared in the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    slots: Vec<(String, Option<String>)>,
}

impl Record {
    /// All fields absent
    pub fn empty(schema: &RecordSchema) -> Self {
        Self {
            slots: schema.names().map(|n| (n.to_string(), None)).collect(),
        }
    }

    /// Record pre-populated from `(field, value)` pairs; unknown fields are ignored
    pub fn with_values<'a, I>(schema: &RecordSchema, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut record = Self::empty(schema);
        for (name, value) in values {
            record.set(name, value);
        }
        record
    }

    /// Non-empty value of `name`, if any
    pub fn get(&self, name: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_filled(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.slots.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Copy of this record with every non-empty candidate applied.
    ///
    /// Empty candidates and names the record does not declare are dropped, so
    /// a filled slot can only be replaced by another non-empty value.
    pub fn merged_with(&self, candidates: &CandidateFields) -> Record {
        let mut merged = self.clone();
        for (name, value) in candidates {
            let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            if !merged.set(name, value) {
                tracing::debug!(field = %name, "Ignoring candidate for undeclared field");
            }
        }
        merged
    }

    fn set(&mut self, name: &str, value: &str) -> bool {
        match self.slots.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                let value = value.trim();
                *slot = (!value.is_empty()).then(|| value.to_string());
                true
            }
            None => false,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (name, value) in &self.slots {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
