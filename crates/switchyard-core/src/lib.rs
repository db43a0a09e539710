//! Core domain types and error definitions for switchyard.
//!
//! This crate provides the fundamental types shared across the workspace:
//!
//! - [`AgentError`] — Error type for model calls and the agent loop
//! - [`McpRecord`], [`Bundle`], [`Route`] — Persisted records
//! - [`NewBundle`], [`NewRoute`] — Insert payloads for the store
//! - [`ToolCall`], [`ToolResult`], [`ToolSchema`] — Tool interaction types
//! - [`Turn`] — One entry of an agent conversation
//!
//! # Example
//!
//! ```rust
//! use switchyard_core::{NewRoute, Turn};
//!
//! let route = NewRoute {
//!     bundle_id: "b-1".to_string(),
//!     task_description: "Summarise open issues".to_string(),
//!     tool_sequence: vec!["list_issues".to_string(), "summarise".to_string()],
//!     notes: String::new(),
//!     execution_order: 0,
//!     mcp_tools: vec!["github".to_string()],
//! };
//!
//! let turn = Turn::user("Plan tasks for: triage");
//! assert!(matches!(turn, Turn::User(_)));
//! assert_eq!(route.tool_sequence.len(), 2);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors that can occur during model calls or agent execution.
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM API request failed.
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Failed to parse structured output from LLM.
    #[error("Failed to parse structured output: {0}")]
    ParseError(String),

    /// The model kept requesting tools past the iteration limit.
    #[error("Agent stopped after {0} tool iterations without a final answer")]
    MaxIterations(usize),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ParseError(err.to_string())
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// A tool-server registration. Created out-of-band; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpRecord {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    /// Server name, used as the key when merging tool servers.
    pub name: String,
    /// Opaque connection configuration (see `switchyard_config::ToolServerConfig`).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// A project-scoped grouping of tool servers and the routes planned over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    #[serde(deserialize_with = "string_id")]
    pub project_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Ordered MCP record ids.
    #[serde(default, deserialize_with = "string_ids")]
    pub mcps: Vec<String>,
    /// Ordered route ids, populated once after the routes are created.
    #[serde(default, deserialize_with = "string_ids")]
    pub routes: Vec<String>,
}

/// Insert payload for a bundle. `routes` starts empty.
#[derive(Debug, Clone, Serialize)]
pub struct NewBundle {
    pub project_id: String,
    pub description: String,
    pub mcps: Vec<String>,
    pub routes: Vec<String>,
}

/// One planned task with its ordered tool-call sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    #[serde(deserialize_with = "string_id")]
    pub bundle_id: String,
    pub task_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_sequence: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    pub execution_order: i64,
    #[serde(default, deserialize_with = "string_ids")]
    pub mcp_tools: Vec<String>,
}

/// Insert payload for a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRoute {
    pub bundle_id: String,
    pub task_description: String,
    pub tool_sequence: Vec<String>,
    pub notes: String,
    pub execution_order: i64,
    pub mcp_tools: Vec<String>,
}

/// Accepts string or numeric ids, normalising numbers to their decimal form.
fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    id_from_value(value).map_err(serde::de::Error::custom)
}

fn string_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .into_iter()
        .map(id_from_value)
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}

/// PostgREST returns `null` for unset nullable columns.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn id_from_value(value: serde_json::Value) -> Result<String, String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected string or number id, got {}", other)),
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool call requested by the LLM.
///
/// When an LLM decides to use a tool, it returns one or more `ToolCall`
/// instances with the tool name and arguments to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments to pass to the tool (JSON object).
    pub arguments: serde_json::Value,
}

/// Result of a tool execution to be sent back to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID from the original tool call request.
    pub tool_call_id: String,
    /// Output content from the tool execution.
    pub content: String,
    /// Set when the content describes a failure.
    #[serde(default)]
    pub is_error: bool,
}

/// JSON schema describing a tool for LLM function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name of the tool.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// One entry in an agent conversation, provider-neutral.
///
/// LLM clients translate these into their wire formats.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Text from the user.
    User(String),
    /// An assistant turn that requested tools, with any text it produced alongside.
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Results for the tool calls of the preceding assistant turn.
    ToolResults(Vec<ToolResult>),
}

impl Turn {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User(content.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_become_strings() {
        let bundle: Bundle = serde_json::from_value(json!({
            "id": 42,
            "project_id": "p-1",
            "description": "demo",
            "mcps": [7, "8"],
            "routes": null
        }))
        .unwrap();

        assert_eq!(bundle.id, "42");
        assert_eq!(bundle.mcps, vec!["7", "8"]);
        assert!(bundle.routes.is_empty());
    }

    #[test]
    fn route_defaults_missing_notes() {
        let route: Route = serde_json::from_value(json!({
            "id": "r-1",
            "bundle_id": "b-1",
            "task_description": "fetch",
            "tool_sequence": ["a"],
            "execution_order": 0
        }))
        .unwrap();

        assert_eq!(route.notes, "");
        assert!(route.mcp_tools.is_empty());
    }

    #[test]
    fn null_columns_read_as_empty() {
        let route: Route = serde_json::from_value(json!({
            "id": 3,
            "bundle_id": 1,
            "task_description": "fetch",
            "tool_sequence": null,
            "notes": null,
            "execution_order": 2,
            "mcp_tools": null
        }))
        .unwrap();
        assert!(route.tool_sequence.is_empty());
        assert_eq!(route.notes, "");

        let bundle: Bundle = serde_json::from_value(json!({
            "id": 1,
            "project_id": 9,
            "description": null,
            "mcps": ["4"],
            "routes": ["3"]
        }))
        .unwrap();
        assert_eq!(bundle.description, "");
    }

    #[test]
    fn rejects_object_ids() {
        let err = serde_json::from_value::<McpRecord>(json!({
            "id": {"nested": true},
            "name": "x"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("expected string or number id"));
    }
}
