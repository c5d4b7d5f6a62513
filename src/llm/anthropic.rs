//! Anthropic messages client

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{LlmClient, ToolCallResult, ToolDefinition};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

impl AnthropicClient {
    /// Model comes from `ANTHROPIC_MODEL`, falling back to the default
    pub fn new(api_key: String) -> Self {
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_model(api_key, &model)
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> Value {
        json!({
            "model": &self.model,
            "max_tokens": MAX_TOKENS,
            "system": system_prompt,
            "messages": [{"role": "user", "content": user_prompt}]
        })
    }

    async fn send(&self, body: &Value) -> Result<Vec<ContentBlock>> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {}: {}", status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .context("Failed to decode Anthropic response")?;
        Ok(api_response.content)
    }

    fn first_text(blocks: Vec<ContentBlock>) -> Result<String> {
        blocks
            .into_iter()
            .find_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .ok_or_else(|| anyhow!("Empty response from Anthropic"))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let blocks = self
            .send(&self.request_body(system_prompt, user_prompt))
            .await?;
        Self::first_text(blocks)
    }

    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        // No JSON mode on this API; the instruction rides on the system prompt
        let json_system = format!(
            "{}\n\nIMPORTANT: Respond with valid JSON only. No markdown code blocks, no explanations.",
            system_prompt
        );
        self.chat(&json_system, user_prompt).await
    }

    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        let mut body = self.request_body(system_prompt, user_prompt);
        body["tools"] = json!([{
            "name": &tool.name,
            "description": &tool.description,
            "input_schema": &tool.parameters
        }]);
        body["tool_choice"] = json!({"type": "tool", "name": &tool.name});

        let blocks = self.send(&body).await?;
        let (tool_name, arguments) = blocks
            .into_iter()
            .find_map(|b| match b {
                ContentBlock::ToolUse { name, input } => Some((name, input)),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No tool_use block in Anthropic response"))?;

        tracing::debug!(%arguments, "Anthropic tool call");

        Ok(ToolCallResult {
            tool_name,
            arguments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let client = AnthropicClient::with_model("test-key".to_string(), "claude-3-5-haiku-latest");
        assert_eq!(client.model_name(), "claude-3-5-haiku-latest");
        assert_eq!(client.provider_name(), "Anthropic");
    }

    #[test]
    fn test_content_blocks_decode() {
        let raw = r#"{"content":[
            {"type":"thinking","thinking":"..."},
            {"type":"tool_use","id":"toolu_1","name":"record_form_fields","input":{"address":"Via Roma 1"}},
            {"type":"text","text":"done"}
        ]}"#;
        let response: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(response.content[0], ContentBlock::Other));
        match &response.content[1] {
            ContentBlock::ToolUse { name, input } => {
                assert_eq!(name, "record_form_fields");
                assert_eq!(input["address"], "Via Roma 1");
            }
            other => panic!("unexpected block: {:?}", other),
        }
        assert_eq!(
            AnthropicClient::first_text(response.content).unwrap(),
            "done"
        );
    }
}
