//! Unified LLM client that routes to the appropriate provider based on model name.

use async_trait::async_trait;
use switchyard_core::{AgentError, ToolSchema, Turn};

use crate::anthropic::AnthropicClient;
use crate::client::{ChatResponse, LlmClient};
use crate::ChatModel;

/// Provider type determined from the model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Splits `provider:model` identifiers; bare names route `claude-*` to Anthropic.
    pub fn detect(model: &str) -> (Provider, &str) {
        match model.split_once(':') {
            Some(("anthropic", name)) => (Provider::Anthropic, name),
            Some(("openai", name)) => (Provider::OpenAI, name),
            _ if model.starts_with("claude-") => (Provider::Anthropic, model),
            _ => (Provider::OpenAI, model),
        }
    }
}

enum Backend {
    OpenAI(LlmClient),
    Anthropic(AnthropicClient),
}

/// Unified client that routes requests to OpenAI or Anthropic based on model name.
pub struct UnifiedLlmClient {
    model: String,
    backend: Backend,
}

impl UnifiedLlmClient {
    /// Creates a new unified client, detecting the provider from the model identifier.
    pub fn new(model: &str, api_base: Option<&str>) -> Self {
        let (provider, name) = Provider::detect(model);
        let backend = match provider {
            Provider::Anthropic => Backend::Anthropic(AnthropicClient::new(name)),
            Provider::OpenAI => Backend::OpenAI(LlmClient::new(name, api_base)),
        };

        Self {
            model: model.to_string(),
            backend,
        }
    }

    /// Returns true if this client is configured for Anthropic.
    pub fn is_anthropic(&self) -> bool {
        matches!(self.backend, Backend::Anthropic(_))
    }
}

#[async_trait]
impl ChatModel for UnifiedLlmClient {
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, AgentError> {
        match &self.backend {
            Backend::OpenAI(client) => client.chat_with_tools(system_prompt, turns, tools).await,
            Backend::Anthropic(client) => client.chat_with_tools(system_prompt, turns, tools).await,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
