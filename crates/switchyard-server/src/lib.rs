//! HTTP surface of switchyard: the bundler and executor endpoints.
//!
//! - `POST /mcp-bundler` — Plan a description into routes and store them as a bundle
//! - `POST /executor` — Serve a request with a bundle's routes (or a new one)
//! - `GET /health` — Liveness
//!
//! The router is built from a [`ServerState`] so tests can swap the store,
//! the tool provider, and the model.

pub mod dto;
mod error;
mod handlers;
pub mod prompts;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use switchyard_agent::Agent;
use switchyard_store::Store;
use switchyard_tools::ToolProvider;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::AppError;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub tools: Arc<dyn ToolProvider>,
    pub agent: Agent,
}

/// Builds the application router with tracing and CORS layers.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/mcp-bundler", post(handlers::bundler::create_bundle))
        .route("/executor", post(handlers::executor::execute))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
