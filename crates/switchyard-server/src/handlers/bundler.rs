//! `POST /mcp-bundler`.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::dto::{BundlerRequest, BundlerResponse};
use crate::error::AppError;
use crate::services::bundler;
use crate::ServerState;

pub async fn create_bundle(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<BundlerRequest>,
) -> Result<Json<BundlerResponse>, AppError> {
    info!(
        "Bundling project {} over {} MCP servers: {}...",
        req.project_id,
        req.mcp_ids.len(),
        req.description.chars().take(50).collect::<String>()
    );

    let outcome = bundler::create_bundle(&state, &req).await?;
    Ok(Json(BundlerResponse {
        bundle_id: outcome.bundle_id,
        routes_created: outcome.route_ids.len(),
    }))
}
