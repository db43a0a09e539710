//! Bundler: free-text description to a persisted bundle of routes.

use switchyard_agent::{structured, Parsed, PlannedTask, TaskPlanning};
use switchyard_core::{NewBundle, NewRoute};
use tracing::{info, warn};

use super::{tool_servers, PlanSource, ServiceError};
use crate::dto::BundlerRequest;
use crate::prompts;
use crate::ServerState;

pub const FALLBACK_NOTES: &str = "Auto-generated from description";
const FALLBACK_TOOL_COUNT: usize = 3;

/// Result of a bundler run.
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub bundle_id: String,
    pub route_ids: Vec<String>,
    pub plan_source: PlanSource,
}

/// The single task used when the agent's plan cannot be read.
fn fallback_plan(description: &str, tool_names: &[String]) -> Vec<PlannedTask> {
    vec![PlannedTask {
        task_description: description.to_string(),
        tool_sequence: tool_names.iter().take(FALLBACK_TOOL_COUNT).cloned().collect(),
        notes: FALLBACK_NOTES.to_string(),
    }]
}

/// Plans tasks for `req.description` and stores them as one bundle.
///
/// Writes are sequential and not transactional: bundle, then each route, then
/// the bundle's route list.
pub async fn create_bundle(state: &ServerState, req: &BundlerRequest) -> Result<BundleOutcome, ServiceError> {
    let records = tool_servers(state.store.as_ref(), &req.mcp_ids).await?;
    let tools = state.tools.load(&records).await?;
    let tool_names = tools.names();

    let system_prompt = prompts::bundler_prompt(&req.description, &tool_names);
    let run = state
        .agent
        .invoke(&system_prompt, &prompts::bundler_user_message(&req.description), &tools)
        .await?;

    let (tasks, plan_source) = match structured::parse::<TaskPlanning>(&run.final_text) {
        Parsed::Structured(plan) => (plan.tasks, PlanSource::Agent),
        Parsed::Fallback { reason, .. } => {
            warn!("Task plan unreadable, using fallback: {}", reason);
            (fallback_plan(&req.description, &tool_names), PlanSource::Fallback)
        }
    };

    let bundle = state
        .store
        .insert_bundle(&NewBundle {
            project_id: req.project_id.clone(),
            description: req.description.clone(),
            mcps: req.mcp_ids.clone(),
            routes: Vec::new(),
        })
        .await?;

    let mut route_ids = Vec::with_capacity(tasks.len());
    for (order, task) in tasks.into_iter().enumerate() {
        let route = state
            .store
            .insert_route(&NewRoute {
                bundle_id: bundle.id.clone(),
                task_description: task.task_description,
                tool_sequence: task.tool_sequence,
                notes: task.notes,
                execution_order: order as i64,
                mcp_tools: req.mcp_ids.clone(),
            })
            .await?;
        route_ids.push(route.id);
    }

    state.store.set_bundle_routes(&bundle.id, &route_ids).await?;

    info!(
        "Bundle {} created with {} routes ({:?} plan)",
        bundle.id,
        route_ids.len(),
        plan_source
    );

    Ok(BundleOutcome {
        bundle_id: bundle.id,
        route_ids,
        plan_source,
    })
}
