//! `POST /executor`.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::dto::{ExecutorRequest, ExecutorResponse};
use crate::error::AppError;
use crate::services::executor;
use crate::ServerState;

pub async fn execute(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ExecutorRequest>,
) -> Result<Json<ExecutorResponse>, AppError> {
    info!("Executing against bundle {}", req.bundle_id);
    let outcome = executor::execute(&state, &req).await?;
    Ok(Json(outcome.response))
}
