//! OpenAI-compatible chat client with tool calling.
//!
//! Works with the OpenAI API and any compatible endpoint.

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        FunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use switchyard_core::{AgentError, ToolCall, ToolSchema, Turn};
use tracing::info;

use crate::ChatModel;

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

/// Response from an LLM that may include tool calls.
#[derive(Debug, Clone)]
pub enum ChatResponse {
    Content(LlmResponse),
    ToolCalls {
        calls: Vec<ToolCall>,
        /// Text the model emitted alongside the calls, if any.
        text: Option<String>,
        metrics: LlmMetrics,
    },
}

/// Converts any error into an AgentError::LlmError.
fn llm_err(e: impl ToString) -> AgentError {
    AgentError::LlmError(e.to_string())
}

/// Translates provider-neutral turns into OpenAI chat messages.
pub(crate) fn to_openai_messages(
    system_prompt: &str,
    turns: &[Turn],
) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
    let mut messages = vec![ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(llm_err)?,
    )];

    for turn in turns {
        match turn {
            Turn::User(text) => messages.push(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.as_str())
                    .build()
                    .map_err(llm_err)?,
            )),
            Turn::Assistant { text, tool_calls } => {
                let calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                    .iter()
                    .map(|tc| ChatCompletionMessageToolCall {
                        id: tc.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.to_string(),
                        },
                    })
                    .collect();

                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = text {
                    builder.content(text.as_str());
                }
                if !calls.is_empty() {
                    builder.tool_calls(calls);
                }
                messages.push(ChatCompletionRequestMessage::Assistant(
                    builder.build().map_err(llm_err)?,
                ));
            }
            Turn::ToolResults(results) => {
                for result in results {
                    messages.push(ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(result.tool_call_id.as_str())
                            .content(result.content.as_str())
                            .build()
                            .map_err(llm_err)?,
                    ));
                }
            }
        }
    }

    Ok(messages)
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl LlmClient {
    /// Creates a new client for the given model and optional API base URL.
    ///
    /// The API key is read from `OPENAI_API_KEY` by the underlying SDK.
    pub fn new(model: &str, api_base: Option<&str>) -> Self {
        let config = match api_base {
            Some(base) => OpenAIConfig::default().with_api_base(base),
            None => OpenAIConfig::default(),
        };

        Self {
            client: Client::with_config(config),
            default_model: model.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, AgentError> {
        let start = Instant::now();

        let openai_tools: Vec<ChatCompletionTool> = tools
            .iter()
            .map(|t| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: t.name.clone(),
                    description: Some(t.description.clone()),
                    parameters: Some(t.parameters.clone()),
                    strict: None,
                },
            })
            .collect();

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.default_model)
            .messages(to_openai_messages(system_prompt, turns)?);

        if !openai_tools.is_empty() {
            request_builder.tools(openai_tools);
        }

        let request = request_builder.build().map_err(llm_err)?;
        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        let metrics = LlmMetrics { input_tokens, output_tokens, elapsed_ms };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmError("No response choices".into()))?;

        if let Some(tool_calls) = choice.message.tool_calls {
            if !tool_calls.is_empty() {
                let calls: Vec<ToolCall> = tool_calls
                    .into_iter()
                    .map(|tc| {
                        let args: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                            .unwrap_or(serde_json::Value::Null);
                        ToolCall {
                            id: tc.id,
                            name: tc.function.name,
                            arguments: args,
                        }
                    })
                    .collect();
                info!(
                    "LLM: {}ms, tokens: {}/{} (in/out), tool_calls: {}",
                    elapsed_ms,
                    input_tokens,
                    output_tokens,
                    calls.len()
                );
                return Ok(ChatResponse::ToolCalls {
                    calls,
                    text: choice.message.content.filter(|c| !c.is_empty()),
                    metrics,
                });
            }
        }

        let content = choice
            .message
            .content
            .ok_or_else(|| AgentError::LlmError("No response content".into()))?;

        info!("LLM: {}ms, tokens: {}/{} (in/out)", elapsed_ms, input_tokens, output_tokens);

        Ok(ChatResponse::Content(LlmResponse { content, metrics }))
    }

    fn model_name(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::ToolResult;

    #[test]
    fn tool_results_become_one_message_each() {
        let turns = vec![
            Turn::user("list files"),
            Turn::Assistant {
                text: None,
                tool_calls: vec![
                    ToolCall { id: "c1".into(), name: "ls".into(), arguments: serde_json::json!({}) },
                    ToolCall { id: "c2".into(), name: "pwd".into(), arguments: serde_json::json!({}) },
                ],
            },
            Turn::ToolResults(vec![
                ToolResult { tool_call_id: "c1".into(), content: "a.txt".into(), is_error: false },
                ToolResult { tool_call_id: "c2".into(), content: "/tmp".into(), is_error: false },
            ]),
        ];

        let messages = to_openai_messages("sys", &turns).unwrap();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::Tool(_)));
        assert!(matches!(messages[4], ChatCompletionRequestMessage::Tool(_)));
    }
}
