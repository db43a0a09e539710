//! Executor: match a request against a bundle's routes, or improvise one.

use switchyard_agent::{structured, Parsed, RouteExecution};
use switchyard_core::Route;
use tracing::{info, warn};

use super::{tool_servers, PlanSource, ServiceError};
use crate::dto::{ExecutorRequest, ExecutorResponse};
use crate::prompts;
use crate::ServerState;

/// Reported when the agent names no route and the bundle has none.
pub const NEW_ROUTE: &str = "new_route";
/// Reported when the reply is unreadable and the bundle has no routes.
pub const NEW_ROUTE_CREATED: &str = "new_route_created";

/// Result of an executor run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub response: ExecutorResponse,
    pub plan_source: PlanSource,
}

/// Builds the response from the agent's parsed (or unparsed) reply.
fn interpret(parsed: Parsed<RouteExecution>, routes: &[Route]) -> ExecutionOutcome {
    let first_route = routes.first().map(|r| r.id.clone());

    match parsed {
        Parsed::Structured(exec) => {
            let route_used = if exec.route_used.is_empty() {
                first_route.unwrap_or_else(|| NEW_ROUTE.to_string())
            } else {
                exec.route_used
            };
            ExecutionOutcome {
                response: ExecutorResponse {
                    result: serde_json::Value::String(exec.execution_result),
                    route_used: Some(route_used),
                    // A bundle without routes can only be served by a new one.
                    new_route_created: exec.new_route_created || routes.is_empty(),
                },
                plan_source: PlanSource::Agent,
            }
        }
        Parsed::Fallback { raw, reason } => {
            warn!("Execution report unreadable, returning raw reply: {}", reason);
            ExecutionOutcome {
                response: ExecutorResponse {
                    result: serde_json::Value::String(raw),
                    route_used: Some(first_route.unwrap_or_else(|| NEW_ROUTE_CREATED.to_string())),
                    new_route_created: routes.is_empty(),
                },
                plan_source: PlanSource::Fallback,
            }
        }
    }
}

/// Runs `req.request` against the bundle's routes. Never writes to the store.
pub async fn execute(state: &ServerState, req: &ExecutorRequest) -> Result<ExecutionOutcome, ServiceError> {
    let bundle = state
        .store
        .get_bundle(&req.bundle_id)
        .await?
        .ok_or(ServiceError::BundleNotFound)?;

    let routes = state.store.routes_for_bundle(&bundle.id).await?;
    let records = tool_servers(state.store.as_ref(), &bundle.mcps).await?;
    let tools = state.tools.load(&records).await?;

    let system_prompt = prompts::executor_prompt(&routes, &req.request, &bundle.description, &tools.names());
    let run = state.agent.invoke(&system_prompt, &req.request, &tools).await?;

    let outcome = interpret(structured::parse::<RouteExecution>(&run.final_text), &routes);
    info!(
        "Bundle {} executed: route_used={:?}, new_route_created={}, {:?} report, {} tool calls",
        bundle.id,
        outcome.response.route_used,
        outcome.response.new_route_created,
        outcome.plan_source,
        run.tool_calls.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str) -> Route {
        Route {
            id: id.into(),
            bundle_id: "b".into(),
            task_description: "t".into(),
            tool_sequence: vec![],
            notes: String::new(),
            execution_order: 0,
            mcp_tools: vec![],
        }
    }

    fn exec(route_used: &str, new_route_created: bool) -> Parsed<RouteExecution> {
        Parsed::Structured(RouteExecution {
            matched_route: !route_used.is_empty(),
            route_used: route_used.into(),
            execution_result: "ok".into(),
            new_route_created,
        })
    }

    fn fallback() -> Parsed<RouteExecution> {
        Parsed::Fallback {
            raw: "plain text".into(),
            reason: "no JSON".into(),
        }
    }

    #[test]
    fn reported_route_wins() {
        let out = interpret(exec("r-2", false), &[route("r-1"), route("r-2")]);
        assert_eq!(out.response.route_used.as_deref(), Some("r-2"));
        assert_eq!(out.plan_source, PlanSource::Agent);
    }

    #[test]
    fn empty_route_defaults_to_first_then_new_route() {
        let out = interpret(exec("", false), &[route("r-1")]);
        assert_eq!(out.response.route_used.as_deref(), Some("r-1"));

        let out = interpret(exec("", false), &[]);
        assert_eq!(out.response.route_used.as_deref(), Some(NEW_ROUTE));
        assert!(out.response.new_route_created);

        let out = interpret(exec("r-1", false), &[route("r-1")]);
        assert!(!out.response.new_route_created);
    }

    #[test]
    fn fallback_uses_raw_text() {
        let out = interpret(fallback(), &[route("r-1")]);
        assert_eq!(out.response.result, serde_json::json!("plain text"));
        assert_eq!(out.response.route_used.as_deref(), Some("r-1"));
        assert!(!out.response.new_route_created);
        assert_eq!(out.plan_source, PlanSource::Fallback);

        let out = interpret(fallback(), &[]);
        assert_eq!(out.response.route_used.as_deref(), Some(NEW_ROUTE_CREATED));
        assert!(out.response.new_route_created);
    }
}
