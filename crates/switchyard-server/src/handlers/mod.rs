//! HTTP route handlers.

pub mod bundler;
pub mod executor;

use axum::Json;

use crate::dto::HealthResponse;

/// Health check endpoint. Checks nothing downstream.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
