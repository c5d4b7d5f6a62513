//! OpenAI chat-completions client

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{LlmClient, ToolCallResult, ToolDefinition};

const DEFAULT_MODEL: &str = "gpt-4o";
const API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

#[derive(Deserialize)]
struct ToolFunction {
    name: String,
    /// JSON encoded as a string
    arguments: String,
}

#[derive(Deserialize)]
struct ToolCall {
    function: ToolFunction,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

impl OpenAiClient {
    /// Model comes from `OPENAI_MODEL`, falling back to the default
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
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
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> Value {
        json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.1
        })
    }

    async fn send(&self, body: &Value) -> Result<Message> {
        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .context("Failed to decode OpenAI response")?;
        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("OpenAI returned no choices"))
    }

    async fn complete(&self, body: Value) -> Result<String> {
        self.send(&body)
            .await?
            .content
            .ok_or_else(|| anyhow!("OpenAI returned an empty message"))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.complete(self.request_body(system_prompt, user_prompt))
            .await
    }

    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let mut body = self.request_body(system_prompt, user_prompt);
        body["response_format"] = json!({"type": "json_object"});
        self.complete(body).await
    }

    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        let mut body = self.request_body(system_prompt, user_prompt);
        body["tools"] = json!([{
            "type": "function",
            "function": {
                "name": &tool.name,
                "description": &tool.description,
                "parameters": &tool.parameters
            }
        }]);
        body["tool_choice"] = json!({"type": "function", "function": {"name": &tool.name}});

        let message = self.send(&body).await?;
        let call = message
            .tool_calls
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No tool call in OpenAI response"))?;

        tracing::debug!(arguments = %call.function.arguments, "OpenAI tool call");

        let arguments: Value = serde_json::from_str(&call.function.arguments)
            .map_err(|e| anyhow!("Failed to parse tool arguments: {}", e))?;
        Ok(ToolCallResult {
            tool_name: call.function.name,
            arguments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}
