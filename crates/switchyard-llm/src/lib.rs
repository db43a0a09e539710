//! Tool-calling LLM clients for OpenAI and Anthropic APIs.
//!
//! - [`UnifiedLlmClient`] — Recommended: auto-routes to the correct provider
//! - [`LlmClient`] — OpenAI-compatible client
//! - [`AnthropicClient`] — Claude models via the Messages API
//! - [`ChatModel`] — The seam the agent loop talks to
//!
//! # Tool Calling
//!
//! ```rust,ignore
//! use switchyard_llm::{ChatModel, ChatResponse, ToolSchema, Turn, UnifiedLlmClient};
//!
//! let client = UnifiedLlmClient::new("anthropic:claude-sonnet-4-5-20250929", None);
//! let turns = vec![Turn::user("What's in /tmp?")];
//! match client.chat_with_tools("You are helpful.", &turns, &tools).await? {
//!     ChatResponse::Content(resp) => println!("{}", resp.content),
//!     ChatResponse::ToolCalls { calls, .. } => {
//!         for call in calls {
//!             println!("Call {}: {}({})", call.id, call.name, call.arguments);
//!         }
//!     }
//! }
//! ```

mod anthropic;
mod client;
mod unified;

use async_trait::async_trait;

pub use anthropic::AnthropicClient;
pub use client::{ChatResponse, LlmClient, LlmMetrics, LlmResponse};
pub use switchyard_core::{AgentError, ToolCall, ToolResult, ToolSchema, Turn};
pub use unified::{Provider, UnifiedLlmClient};

/// A model that can hold a tool-calling conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends the conversation so far and returns either final content or tool calls.
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, AgentError>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}
