//! Extraction backends
//!
//! An [`Extractor`] proposes field values from one utterance. The form does not
//! care how: the strategies here are interchangeable.
//!
//! - [`PatternExtractor`]: regex and menu lookup, no model call
//! - [`LlmJsonExtractor`]: few-shot "update this JSON" completion
//! - [`SchemaToolExtractor`]: structured output through a tool/function schema

pub mod llm_json;
pub mod pattern;
pub mod schema_tool;

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::record::Record;

pub use llm_json::LlmJsonExtractor;
pub use pattern::PatternExtractor;
pub use schema_tool::SchemaToolExtractor;

/// Proposed values keyed by field name; `None` means "absent"
pub type CandidateFields = BTreeMap<String, Option<String>>;

/// Single-method capability: turn an utterance into candidate field values
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        utterance: &str,
        record: &Record,
    ) -> Result<CandidateFields, ExtractionError>;

    /// Strategy name for logging
    fn name(&self) -> &str;
}

/// Available extraction strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    #[default]
    Pattern,
    LlmJson,
    SchemaTool,
}

impl ExtractorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Pattern => "pattern",
            ExtractorKind::LlmJson => "llm-json",
            ExtractorKind::SchemaTool => "schema-tool",
        }
    }

    /// Whether this strategy needs an LLM client
    pub fn needs_llm(&self) -> bool {
        !matches!(self, ExtractorKind::Pattern)
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pattern" | "regex" => Ok(ExtractorKind::Pattern),
            "llm-json" | "json" => Ok(ExtractorKind::LlmJson),
            "schema-tool" | "schema" | "tool" => Ok(ExtractorKind::SchemaTool),
            other => Err(format!(
                "Unknown extractor '{}'. Valid values: pattern, llm-json, schema-tool",
                other
            )),
        }
    }
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decode a JSON object of field values.
///
/// `null` is absent, strings are taken as-is, numbers and booleans are
/// stringified. Nested arrays or objects are rejected.
pub fn candidates_from_json(value: &Value) -> Result<CandidateFields, ExtractionError> {
    let object = value
        .as_object()
        .ok_or_else(|| ExtractionError::NotAnObject(value.to_string()))?;

    let mut candidates = CandidateFields::new();
    for (key, v) in object {
        let decoded = match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(ExtractionError::Malformed {
                    reason: format!("field '{}' is not a scalar", key),
                    raw: value.to_string(),
                });
            }
        };
        candidates.insert(key.clone(), decoded);
    }
    Ok(candidates)
}

/// Parse model text (optionally fenced in ```json blocks) into candidates
pub fn parse_candidates(text: &str) -> Result<CandidateFields, ExtractionError> {
    let json = strip_code_fences(text);
    let value: Value = serde_json::from_str(json).map_err(|e| ExtractionError::Malformed {
        reason: e.to_string(),
        raw: text.to_string(),
    })?;
    candidates_from_json(&value)
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();

    let inner = if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
    } else if text.contains("```") {
        text.split("```")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
    } else {
        text
    };

    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidates_from_json() {
        let candidates = candidates_from_json(&json!({
            "pizza_type": "Margherita",
            "address": null,
            "phone": 333123123
        }))
        .unwrap();
        assert_eq!(candidates["pizza_type"].as_deref(), Some("Margherita"));
        assert_eq!(candidates["address"], None);
        assert_eq!(candidates["phone"].as_deref(), Some("333123123"));
    }

    #[test]
    fn test_nested_value_is_malformed() {
        let err = candidates_from_json(&json!({"address": {"street": "Via Roma"}})).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = candidates_from_json(&json!(["Margherita"])).unwrap_err();
        assert!(matches!(err, ExtractionError::NotAnObject(_)));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n{\"pizza_type\": \"Diavola\"}\n```";
        let candidates = parse_candidates(text).unwrap();
        assert_eq!(candidates["pizza_type"].as_deref(), Some("Diavola"));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_candidates("I think you want a pizza").unwrap_err();
        match err {
            ExtractionError::Malformed { raw, .. } => assert_eq!(raw, "I think you want a pizza"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extractor_kind_from_str() {
        assert_eq!("pattern".parse::<ExtractorKind>().unwrap(), ExtractorKind::Pattern);
        assert_eq!("LLM_JSON".parse::<ExtractorKind>().unwrap(), ExtractorKind::LlmJson);
        assert_eq!("tool".parse::<ExtractorKind>().unwrap(), ExtractorKind::SchemaTool);
        assert!("kor".parse::<ExtractorKind>().is_err());
        assert!(ExtractorKind::SchemaTool.needs_llm());
        assert!(!ExtractorKind::Pattern.needs_llm());
    }
}
