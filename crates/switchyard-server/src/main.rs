//! HTTP server entry point.
//!
//! Loads `.env`, reads settings, opens the store, and serves the router.

use std::sync::Arc;

use anyhow::Result;
use switchyard_agent::Agent;
use switchyard_config::{DatabaseConfig, Settings};
use switchyard_llm::UnifiedLlmClient;
use switchyard_server::{create_router, ServerState};
use switchyard_tools::McpToolProvider;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let settings = Settings::from_env()?;

    match &settings.database {
        DatabaseConfig::Supabase { url, .. } => info!("Using Supabase at {}", url),
        DatabaseConfig::Sqlite { path } => info!("Using SQLite at {}", path),
    }
    let store = switchyard_store::connect(&settings.database)?;

    let model = UnifiedLlmClient::new(&settings.model, settings.api_base.as_deref());
    let agent = Agent::new(Arc::new(model), settings.max_iterations);
    info!(
        "Agent model: {} (max {} iterations)",
        agent.model_name(),
        settings.max_iterations
    );

    let state = Arc::new(ServerState {
        store,
        tools: Arc::new(McpToolProvider::new()),
        agent,
    });

    let app = create_router(state);

    info!("Starting server on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
