//! Schema-guided extractor
//!
//! Forces the model through a tool whose JSON schema is generated from the
//! field descriptors, so the reply is structured by construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{candidates_from_json, CandidateFields, Extractor};
use crate::error::ExtractionError;
use crate::llm::{LlmClient, ToolDefinition};
use crate::record::{Record, RecordSchema};

const TOOL_NAME: &str = "record_form_fields";

const SYSTEM_PROMPT: &str = "Extract the details the user provides in their message. \
Only fill in fields the message actually mentions; leave the others null.";

pub struct SchemaToolExtractor {
    client: Arc<dyn LlmClient>,
    tool: ToolDefinition,
}

impl SchemaToolExtractor {
    pub fn new(client: Arc<dyn LlmClient>, schema: &RecordSchema) -> Self {
        Self {
            client,
            tool: Self::tool_definition(schema),
        }
    }

    pub fn tool(&self) -> &ToolDefinition {
        &self.tool
    }

    /// One nullable string property per field, described with its examples
    pub fn tool_definition(schema: &RecordSchema) -> ToolDefinition {
        let mut properties = Map::new();
        for field in schema.fields() {
            let mut description = field.description.clone();
            if !field.examples.is_empty() {
                let examples: Vec<String> = field
                    .examples
                    .iter()
                    .map(|e| format!("\"{}\" -> \"{}\"", e.text, e.value))
                    .collect();
                description.push_str(&format!(" Examples: {}", examples.join("; ")));
            }
            properties.insert(
                field.name.clone(),
                json!({
                    "type": ["string", "null"],
                    "description": description.trim()
                }),
            );
        }

        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Record the form fields mentioned in the user's message".to_string(),
            parameters: json!({
                "type": "object",
                "properties": Value::Object(properties),
                "required": []
            }),
        }
    }

    fn user_prompt(utterance: &str, record: &Record) -> String {
        let current = serde_json::to_string(record).unwrap_or_default();
        format!(
            "Already collected: {}\n\nUser message: {}",
            current, utterance
        )
    }
}

#[async_trait]
impl Extractor for SchemaToolExtractor {
    async fn extract(
        &self,
        utterance: &str,
        record: &Record,
    ) -> Result<CandidateFields, ExtractionError> {
        let result = self
            .client
            .chat_with_tool(SYSTEM_PROMPT, &Self::user_prompt(utterance, record), &self.tool)
            .await
            .map_err(ExtractionError::backend)?;

        if result.tool_name != self.tool.name {
            return Err(ExtractionError::Malformed {
                reason: format!("unexpected tool '{}'", result.tool_name),
                raw: result.arguments.to_string(),
            });
        }

        tracing::debug!(
            provider = self.client.provider_name(),
            arguments = %result.arguments,
            "Schema tool extraction"
        );
        candidates_from_json(&result.arguments)
    }

    fn name(&self) -> &str {
        "schema-tool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormConfig;

    #[test]
    fn test_tool_definition_from_builtin_schema() {
        let schema = FormConfig::pizza_default().unwrap().schema().unwrap();
        let tool = SchemaToolExtractor::tool_definition(&schema);

        assert_eq!(tool.name, TOOL_NAME);
        let props = tool.parameters["properties"].as_object().unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props["phone"]["type"], json!(["string", "null"]));
        let description = props["pizza_type"]["description"].as_str().unwrap();
        assert!(description.starts_with("This is the type of pizza"));
        assert!(description.contains("\"Margherita pizza\" -> \"Margherita\""));
        assert_eq!(tool.parameters["required"], json!([]));
    }

    #[test]
    fn test_user_prompt_includes_current_record() {
        let schema = FormConfig::pizza_default().unwrap().schema().unwrap();
        let record = Record::with_values(&schema, [("pizza_type", "Diavola")]);
        let prompt = SchemaToolExtractor::user_prompt("via Roma 1", &record);
        assert!(prompt.contains(r#""pizza_type":"Diavola""#));
        assert!(prompt.ends_with("User message: via Roma 1"));
    }
}
