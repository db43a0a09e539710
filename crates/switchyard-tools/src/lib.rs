//! Tool registry and MCP tool-server client for switchyard.
//!
//! This crate provides the tool abstraction the agent calls into:
//!
//! - [`Tool`] — Trait for anything the model can call
//! - [`ToolRegistry`] — Ordered registry of available tools
//! - [`McpClient`] — A connected MCP session (stdio, streamable HTTP, or SSE)
//! - [`McpTool`] — Adapts one remote MCP tool to [`Tool`]
//! - [`ToolProvider`] / [`McpToolProvider`] — Turns MCP records into a registry
//!
//! # Connecting tool servers
//!
//! ```rust,ignore
//! use switchyard_tools::{McpToolProvider, ToolProvider};
//!
//! let records = store.mcps_by_ids(&ids).await?;
//! let registry = McpToolProvider::new().load(&records).await?;
//! println!("{:?}", registry.names());
//! ```

mod client;
mod jsonrpc;
mod transport;

pub use client::{McpClient, McpClientError, RemoteTool, ServerInfo};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use switchyard_config::{ConfigError, ToolServerConfig};
use thiserror::Error;
use tracing::{debug, error, info};

pub use switchyard_core::{McpRecord, ToolCall, ToolResult, ToolSchema};

/// Errors that can occur while connecting to or calling tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A tool server could not be reached or initialized.
    #[error("Failed to connect to tool server '{server}': {source}")]
    Connection {
        server: String,
        #[source]
        source: McpClientError,
    },

    /// An MCP record's parameters could not be interpreted.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Tool execution failed with a message.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Trait for tools that can be called by the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError>;

    /// Generates the schema for this tool (default implementation).
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of tools available to one agent invocation.
///
/// Registration order is preserved: it is the order tools are shown to the
/// model and the order [`ToolRegistry::names`] reports them.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool in the registry.
    ///
    /// If a tool with the same name already exists, it is replaced in place.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Registers an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Returns schemas for all registered tools.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Returns the names of all registered tools, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// MCP-backed tools
// ============================================================================

/// One remote tool, called through its server's shared session.
pub struct McpTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, remote: RemoteTool) -> Self {
        Self {
            client,
            description: remote.description.unwrap_or_default(),
            parameters: remote
                .input_schema
                .unwrap_or_else(|| serde_json::json!({ "type": "object", "properties": {} })),
            name: remote.name,
        }
    }

    /// Name of the server this tool lives on.
    pub fn server(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        debug!(server = %self.server(), tool = %self.name, "Calling MCP tool");
        self.client
            .call_tool(&self.name, args)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

/// Produces the tools for a set of MCP records.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn load(&self, records: &[McpRecord]) -> Result<ToolRegistry, ToolError>;
}

/// Connects to every referenced MCP server and merges their tools.
///
/// Records are keyed by `name`: a later record with the same name replaces the
/// earlier configuration. Servers are connected one after another; the first
/// failure aborts the load and drops any sessions already opened.
#[derive(Debug, Default, Clone)]
pub struct McpToolProvider;

impl McpToolProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Resolves records into `(name, config)` pairs, first-seen order, last config wins.
fn merge_servers(records: &[McpRecord]) -> Result<Vec<(String, ToolServerConfig)>, ToolError> {
    let mut order: Vec<String> = Vec::new();
    let mut configs: BTreeMap<String, ToolServerConfig> = BTreeMap::new();

    for record in records {
        let config = ToolServerConfig::from_parameters(&record.name, &record.parameters)?;
        if configs.insert(record.name.clone(), config).is_none() {
            order.push(record.name.clone());
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|name| configs.remove(&name).map(|config| (name, config)))
        .collect())
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn load(&self, records: &[McpRecord]) -> Result<ToolRegistry, ToolError> {
        let mut registry = ToolRegistry::new();

        for (name, config) in merge_servers(records)? {
            info!(server = %name, transport = %config.transport_name(), "Connecting to tool server");

            let client = McpClient::connect(&name, &config).await.map_err(|source| {
                error!(server = %name, error = %source, "Tool server connection failed");
                ToolError::Connection { server: name.clone(), source }
            })?;
            let remote_tools = client
                .list_tools()
                .await
                .map_err(|source| ToolError::Connection { server: name.clone(), source })?;

            let client = Arc::new(client);
            for remote in remote_tools {
                registry.register(McpTool::new(Arc::clone(&client), remote));
            }
        }

        info!(tools = registry.len(), "Tool servers loaded");
        Ok(registry)
    }
}
