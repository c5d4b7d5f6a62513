//! Pattern extractor
//!
//! Deterministic extraction with no model call:
//! 1. Lookup fields (menu / one-of validators) match any allowed value,
//!    case-insensitively, and normalize to the canonical spelling
//! 2. Other fields use configured regexes; capture group 1 is the value

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;

use super::{CandidateFields, Extractor};
use crate::config::{FormConfig, ValidatorConfig};
use crate::error::{ConfigError, ExtractionError};
use crate::record::Record;

/// A compiled matcher for one field
enum Matcher {
    /// Alternation of known values; lowercase match -> canonical value
    Lookup {
        regex: Regex,
        canonical: HashMap<String, String>,
    },
    /// Free-form capture
    Capture(Regex),
}

struct FieldRule {
    field: String,
    matchers: Vec<Matcher>,
}

/// Regex and lookup-table extractor built from the form configuration
pub struct PatternExtractor {
    rules: Vec<FieldRule>,
}

impl PatternExtractor {
    pub fn from_config(config: &FormConfig) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();

        for field in &config.fields {
            let mut matchers = Vec::new();

            let known_values: Vec<String> = match &field.validator {
                ValidatorConfig::Menu { .. } => config.menu.names().map(str::to_string).collect(),
                ValidatorConfig::OneOf { values, .. } => values.clone(),
                _ => Vec::new(),
            };
            if !known_values.is_empty() {
                matchers.push(Self::compile_lookup(&field.name, &known_values)?);
            }

            for pattern in &field.patterns {
                let regex = Regex::new(&format!("(?i){}", pattern)).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "field '{}' has an invalid pattern: {}",
                        field.name, e
                    ))
                })?;
                matchers.push(Matcher::Capture(regex));
            }

            if matchers.is_empty() {
                tracing::debug!(field = %field.name, "No patterns configured; field is never extracted");
                continue;
            }
            rules.push(FieldRule {
                field: field.name.clone(),
                matchers,
            });
        }

        Ok(Self { rules })
    }

    fn compile_lookup(field: &str, values: &[String]) -> Result<Matcher, ConfigError> {
        // Longest first so "Prosciutto e Rucola" wins over a shorter prefix
        let mut sorted: Vec<&String> = values.iter().collect();
        sorted.sort_by_key(|v| std::cmp::Reverse(v.len()));

        let escaped: Vec<String> = sorted.iter().map(|v| regex::escape(v)).collect();
        let regex = Regex::new(&format!(r"(?i)\b({})\b", escaped.join("|"))).map_err(|e| {
            ConfigError::Invalid(format!("field '{}' lookup table: {}", field, e))
        })?;
        let canonical = values
            .iter()
            .map(|v| (v.to_lowercase(), v.clone()))
            .collect();

        Ok(Matcher::Lookup { regex, canonical })
    }

    fn match_field(rule: &FieldRule, utterance: &str) -> Option<String> {
        rule.matchers.iter().find_map(|matcher| match matcher {
            Matcher::Lookup { regex, canonical } => {
                let found = regex.captures(utterance)?.get(1)?.as_str().to_lowercase();
                canonical.get(&found).cloned()
            }
            Matcher::Capture(regex) => {
                let value = regex.captures(utterance)?.get(1)?.as_str();
                let value = value
                    .trim()
                    .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')');
                (!value.is_empty()).then(|| value.to_string())
            }
        })
    }
}

#[async_trait]
impl Extractor for PatternExtractor {
    async fn extract(
        &self,
        utterance: &str,
        _record: &Record,
    ) -> Result<CandidateFields, ExtractionError> {
        let candidates: CandidateFields = self
            .rules
            .iter()
            .filter_map(|rule| {
                Self::match_field(rule, utterance).map(|v| (rule.field.clone(), Some(v)))
            })
            .collect();

        tracing::debug!(
            extractor = self.name(),
            fields = ?candidates.keys().collect::<Vec<_>>(),
            "Pattern extraction"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "pattern"
    }
}
