//! MCP session client: handshake, tool discovery, and tool invocation over any transport.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::{json, Value};
use switchyard_config::ToolServerConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest};
use crate::transport::{HttpTransport, SseTransport, StdioTransport, Transport};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("Failed to spawn MCP server process: {0}")]
    SpawnFailed(String),

    #[error("Failed to communicate with MCP server: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error talking to MCP server: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("MCP protocol error: {0}")]
    ProtocolError(String),

    #[error("Timeout waiting for MCP server response")]
    Timeout,

    #[error("MCP server returned error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    /// `tools/call` answered with `isError: true`.
    #[error("{0}")]
    ToolFailed(String),
}

/// Server information from initialize.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion", default)]
    protocol_version: Option<String>,
    #[serde(rename = "serverInfo", default)]
    server_info: Option<ServerInfo>,
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListToolsPage {
    #[serde(default)]
    tools: Vec<RemoteTool>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// A connected, initialized MCP session.
pub struct McpClient {
    name: String,
    transport: Box<dyn Transport>,
    request_id: AtomicU64,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Opens the transport described by `config` and performs the MCP handshake.
    pub async fn connect(name: &str, config: &ToolServerConfig) -> Result<Self, McpClientError> {
        let transport: Box<dyn Transport> = match config {
            ToolServerConfig::Stdio { command, args, env, cwd } => {
                Box::new(StdioTransport::spawn(command, args, env, cwd.as_deref())?)
            }
            ToolServerConfig::StreamableHttp { url, headers } => Box::new(HttpTransport::new(url, headers)?),
            ToolServerConfig::Sse { url, headers } => Box::new(SseTransport::connect(url, headers).await?),
        };

        let mut client = Self {
            name: name.to_string(),
            transport,
            request_id: AtomicU64::new(1),
            server_info: None,
        };
        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<(), McpClientError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result: InitializeResult = serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        info!(
            server = %self.name,
            protocol = result.protocol_version.as_deref().unwrap_or("unknown"),
            remote = result.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            "MCP session initialized"
        );
        self.server_info = result.server_info;

        self.transport
            .notify(&JsonRpcNotification::new("notifications/initialized"))
            .await
    }

    /// Lists every tool the server offers, following `nextCursor` pages.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpClientError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsPage = serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen_cursors.insert(next.clone()) {
                        warn!(server = %self.name, cursor = %next, "Tool list cursor repeated, stopping pagination");
                        break;
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(server = %self.name, count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Calls a tool and flattens its content to text.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpClientError> {
        let arguments = match arguments {
            Value::Object(_) => arguments,
            _ => json!({}),
        };
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;

        let text = flatten_content(&result);
        let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
        if is_error {
            return Err(McpClientError::ToolFailed(if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text
            }));
        }
        Ok(text)
    }

    /// The configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server info reported during initialize.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpClientError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self.transport.request(&request).await?;

        if let Some(error) = response.error {
            return Err(McpClientError::ServerError {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| McpClientError::ProtocolError("Missing result in response".to_string()))
    }
}

/// Text items joined by newlines; anything else rendered as JSON.
fn flatten_content(result: &Value) -> String {
    let Some(items) = result.get("content").and_then(Value::as_array) else {
        return String::new();
    };

    items
        .iter()
        .map(|item| match (item.get("type").and_then(Value::as_str), item.get("text")) {
            (Some("text"), Some(Value::String(text))) => text.clone(),
            _ => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::JsonRpcResponse;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Answers every `tools/list` with one tool, then cursor "a", then "b" forever.
    struct StuckCursor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for StuckCursor {
        async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let cursor = if n == 0 { "a" } else { "b" };
            Ok(JsonRpcResponse {
                id: Some(json!(request.id)),
                result: Some(json!({
                    "tools": [{"name": format!("tool_{n}")}],
                    "nextCursor": cursor
                })),
                error: None,
            })
        }

        async fn notify(&self, _notification: &JsonRpcNotification) -> Result<(), McpClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn repeated_cursor_ends_pagination() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = McpClient {
            name: "stuck".into(),
            transport: Box::new(StuckCursor { calls: Arc::clone(&calls) }),
            request_id: AtomicU64::new(1),
            server_info: None,
        };

        let tools = client.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tool_0", "tool_1", "tool_2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn text_content_is_joined() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(flatten_content(&result), "first\nsecond");
    }

    #[test]
    fn non_text_content_is_rendered_as_json() {
        let result = json!({
            "content": [
                {"type": "text", "text": "see image"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"}
            ]
        });
        let flat = flatten_content(&result);
        let mut lines = flat.lines();
        assert_eq!(lines.next(), Some("see image"));
        let image: Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(image["mimeType"], "image/png");
    }

    #[test]
    fn missing_content_is_empty() {
        assert_eq!(flatten_content(&json!({})), "");
    }

    #[test]
    fn list_page_reads_cursor() {
        let page: ListToolsPage = serde_json::from_value(json!({
            "tools": [{"name": "read_file", "inputSchema": {"type": "object"}}],
            "nextCursor": "abc"
        }))
        .unwrap();
        assert_eq!(page.tools[0].name, "read_file");
        assert!(page.tools[0].description.is_none());
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }
}
