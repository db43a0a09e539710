//! Tool-calling agent for switchyard.
//!
//! - [`Agent`] — Runs the model against a [`ToolRegistry`] until it answers
//! - [`structured`] — Schema instructions and JSON extraction for replies
//! - [`TaskPlanning`] / [`RouteExecution`] — The two record shapes the services request
//!
//! # Agentic loop
//!
//! 1. Send the conversation and tool schemas to the model
//! 2. If the model returns tool calls, execute them in order
//! 3. Send the results back (failures included, as error results)
//! 4. Repeat until the model returns final content, at most `max_iterations` turns
//!
//! ```rust,ignore
//! let agent = Agent::new(Arc::new(UnifiedLlmClient::new(&settings.model, None)), 25);
//! let run = agent.invoke(&system_prompt, "Plan tasks for: triage", &registry).await?;
//! let plan = structured::parse::<TaskPlanning>(&run.final_text);
//! ```

mod plans;
pub mod structured;

pub use plans::{PlannedTask, RouteExecution, TaskPlanning};
pub use structured::{format_instructions, Parsed, StructuredOutput};

use std::sync::Arc;

use switchyard_core::{AgentError, ToolCall, ToolResult, Turn};
use switchyard_llm::{ChatModel, ChatResponse};
use switchyard_tools::ToolRegistry;
use tracing::{info, warn};

/// What one agent invocation produced.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Content of the model's last message.
    pub final_text: String,
    /// Model turns taken, including the final one.
    pub iterations: usize,
    /// Every tool call the model made, in order.
    pub tool_calls: Vec<ToolCall>,
}

/// A model plus an iteration bound. Cheap to clone and share across requests.
#[derive(Clone)]
pub struct Agent {
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, max_iterations: usize) -> Self {
        Self {
            model,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answers `user_message` under `system_prompt`, letting the model call any tool in `tools`.
    pub async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: &ToolRegistry,
    ) -> Result<AgentRun, AgentError> {
        let schemas = tools.list();
        let mut turns = vec![Turn::user(user_message)];
        let mut made_calls: Vec<ToolCall> = Vec::new();

        info!(
            "║ Agent start: model={}, tools={}, input={}...",
            self.model.model_name(),
            schemas.len(),
            user_message.chars().take(50).collect::<String>()
        );

        for iteration in 1..=self.max_iterations {
            let response = self
                .model
                .chat_with_tools(system_prompt, &turns, &schemas)
                .await?;

            match response {
                ChatResponse::Content(llm_response) => {
                    info!(
                        "║     ← Final response: {} chars (after {} iterations)",
                        llm_response.content.len(),
                        iteration
                    );
                    return Ok(AgentRun {
                        final_text: llm_response.content,
                        iterations: iteration,
                        tool_calls: made_calls,
                    });
                }
                ChatResponse::ToolCalls { calls, text, metrics: _ } => {
                    info!(
                        "║     ← Tool calls: {:?}",
                        calls.iter().map(|c| &c.name).collect::<Vec<_>>()
                    );

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(run_tool(tools, call).await);
                    }

                    made_calls.extend(calls.iter().cloned());
                    turns.push(Turn::Assistant { text, tool_calls: calls });
                    turns.push(Turn::ToolResults(results));
                }
            }
        }

        warn!("║     ⚠ Max tool iterations ({}) reached", self.max_iterations);
        Err(AgentError::MaxIterations(self.max_iterations))
    }
}

/// Executes one call. Failures become error results for the model to read.
async fn run_tool(tools: &ToolRegistry, call: &ToolCall) -> ToolResult {
    let Some(tool) = tools.get(&call.name) else {
        warn!("║       ⚠ Unknown tool requested: {}", call.name);
        return ToolResult {
            tool_call_id: call.id.clone(),
            content: format!("Error: Tool not found: {}", call.name),
            is_error: true,
        };
    };

    info!("║       → Executing tool: {}", call.name);
    match tool.execute(call.arguments.clone()).await {
        Ok(output) => {
            info!("║       ← Tool result: {} chars", output.len());
            ToolResult {
                tool_call_id: call.id.clone(),
                content: output,
                is_error: false,
            }
        }
        Err(e) => {
            warn!("║       ⚠ Tool {} failed: {}", call.name, e);
            ToolResult {
                tool_call_id: call.id.clone(),
                content: format!("Error: {}", e),
                is_error: true,
            }
        }
    }
}
