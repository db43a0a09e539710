//! Data transfer objects for HTTP message serialization.

use serde::{Deserialize, Serialize};

// === Bundler ===

/// Body of `POST /mcp-bundler`.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerRequest {
    pub project_id: String,
    pub mcp_ids: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundlerResponse {
    pub bundle_id: String,
    pub routes_created: usize,
}

// === Executor ===

/// Body of `POST /executor`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorRequest {
    pub bundle_id: String,
    pub request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorResponse {
    /// Whatever the agent produced; currently always a string.
    pub result: serde_json::Value,
    pub route_used: Option<String>,
    #[serde(default)]
    pub new_route_created: bool,
}

// === Health ===

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
