//! Business logic behind the HTTP handlers.

pub mod bundler;
pub mod executor;

use switchyard_core::{AgentError, McpRecord};
use switchyard_store::{Store, StoreError};
use switchyard_tools::ToolError;
use thiserror::Error;

/// Failures of the bundler and executor flows.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Bundle not found")]
    BundleNotFound,

    /// None of the requested tool-server ids exist.
    #[error("No MCP servers found for ids {0:?}")]
    NoToolServers(Vec<String>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tools(#[from] ToolError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Where the persisted or reported plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    /// The agent's reply parsed as the requested schema.
    Agent,
    /// The reply did not parse; built-in defaults were used.
    Fallback,
}

/// Loads the MCP records for `ids`; an empty match is an error.
async fn tool_servers(store: &dyn Store, ids: &[String]) -> Result<Vec<McpRecord>, ServiceError> {
    let records = store.mcps_by_ids(ids).await?;
    if records.is_empty() {
        return Err(ServiceError::NoToolServers(ids.to_vec()));
    }
    Ok(records)
}
