//! Anthropic Claude API client with tool support.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use switchyard_core::{AgentError, ToolCall, ToolSchema, Turn};
use tracing::info;

use crate::client::ChatResponse;
use crate::{ChatModel, LlmMetrics, LlmResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

/// Tool definition for Anthropic API.
#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

/// Request body with tools.
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

/// Message with content blocks.
#[derive(Serialize, Debug, Clone, PartialEq)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<MessageContentBlock>,
}

/// Content block in a message - can be text, tool_use, or tool_result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
enum MessageContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not", default)]
        is_error: bool,
    },
}

/// Response that may contain tool_use blocks.
#[derive(Deserialize)]
struct ToolResponse {
    content: Vec<ToolResponseBlock>,
    usage: Usage,
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

/// A content block in the response.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum ToolResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Translates provider-neutral turns into Anthropic messages.
///
/// Tool results ride in a user message right after the assistant's tool_use turn.
fn to_anthropic_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => AnthropicMessage {
                role: "user",
                content: vec![MessageContentBlock::Text { text: text.clone() }],
            },
            Turn::Assistant { text, tool_calls } => {
                let mut content: Vec<MessageContentBlock> = text
                    .iter()
                    .filter(|t| !t.is_empty())
                    .map(|t| MessageContentBlock::Text { text: t.clone() })
                    .collect();
                content.extend(tool_calls.iter().map(|tc| MessageContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: normalize_input(&tc.arguments),
                }));
                AnthropicMessage { role: "assistant", content }
            }
            Turn::ToolResults(results) => AnthropicMessage {
                role: "user",
                content: results
                    .iter()
                    .map(|r| MessageContentBlock::ToolResult {
                        tool_use_id: r.tool_call_id.clone(),
                        content: r.content.clone(),
                        is_error: r.is_error,
                    })
                    .collect(),
            },
        })
        .collect()
}

/// Anthropic rejects non-object tool inputs.
fn normalize_input(arguments: &serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::Object(_) => arguments.clone(),
        _ => serde_json::json!({}),
    }
}

/// Client for Anthropic's Claude API.
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic client, reading `ANTHROPIC_API_KEY`.
    pub fn new(model: &str) -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        tracing::info!(
            "AnthropicClient: model={}, api_key_len={}",
            model,
            api_key.len()
        );
        Self {
            client: Client::new(),
            model: model.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, AgentError> {
        let start = std::time::Instant::now();

        let anthropic_tools: Vec<AnthropicTool> = tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect();

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: system_prompt.to_string(),
            messages: to_anthropic_messages(turns),
            tools: anthropic_tools,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::LlmError(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        let resp: ToolResponse = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let metrics = LlmMetrics {
            input_tokens: resp.usage.input_tokens.unwrap_or(0),
            output_tokens: resp.usage.output_tokens.unwrap_or(0),
            elapsed_ms,
        };

        let text: String = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ToolResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let tool_calls: Vec<ToolCall> = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ToolResponseBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                _ => None,
            })
            .collect();

        if !tool_calls.is_empty() {
            info!(
                "Anthropic: {}ms, tokens: {}/{}, tool_calls: {}",
                elapsed_ms,
                metrics.input_tokens,
                metrics.output_tokens,
                tool_calls.len()
            );
            return Ok(ChatResponse::ToolCalls {
                calls: tool_calls,
                text: Some(text).filter(|t| !t.is_empty()),
                metrics,
            });
        }

        info!(
            "Anthropic: {}ms, tokens: {}/{}, content: {} chars",
            elapsed_ms,
            metrics.input_tokens,
            metrics.output_tokens,
            text.len()
        );

        Ok(ChatResponse::Content(LlmResponse { content: text, metrics }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
