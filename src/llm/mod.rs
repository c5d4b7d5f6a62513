//! LLM client abstraction
//!
//! The model is an opaque text-completion oracle used by the LLM extraction
//! strategies and the LLM question writer. Providers implement [`LlmClient`];
//! [`create_llm_client`] picks one from the environment.
//!
//! Set `AGENT_BACKEND` to select the provider:
//! - `anthropic` (default): needs `ANTHROPIC_API_KEY`, optional `ANTHROPIC_MODEL`
//! - `openai`: needs `OPENAI_API_KEY`, optional `OPENAI_MODEL`

pub mod anthropic;
pub mod backend;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicClient;
pub use backend::LlmBackend;
pub use openai::OpenAiClient;

/// Tool/function definition for structured output
///
/// - Anthropic: maps to `tools` with a forced `tool_choice`
/// - OpenAI: maps to `tools` with a forced function `tool_choice`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// Structured arguments returned by a forced tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Unified interface over LLM providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Plain completion
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Completion that should contain a single JSON document
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Completion forced through `tool`, returning its arguments
    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult>;

    fn model_name(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// Create a client for the backend named by `AGENT_BACKEND`
pub fn create_llm_client() -> Result<Arc<dyn LlmClient>> {
    let backend = LlmBackend::from_env()?;
    create_llm_client_for(backend)
}

/// Create a client for an explicit backend, reading its key from the environment
pub fn create_llm_client_for(backend: LlmBackend) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match backend {
        LlmBackend::Anthropic => Arc::new(AnthropicClient::from_env()?),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::from_env()?),
    };
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "LLM client ready"
    );
    Ok(client)
}
