//! System prompts for the bundler and executor agents.

use switchyard_agent::{format_instructions, RouteExecution, TaskPlanning};
use switchyard_core::Route;

/// Renders tool names as a bracketed, quoted list.
fn name_list(names: &[String]) -> String {
    format!("{:?}", names)
}

pub fn bundler_prompt(description: &str, tool_names: &[String]) -> String {
    format!(
        r#"You are a task planning agent. Break down the description into specific tasks and create routes.

Your job:
1. Analyze the description: "{description}"
2. Look at available MCP tools and figure out what tasks can be accomplished
3. Create routes (sequences of tool calls) for each task

Available tools: {tools}

{instructions}"#,
        description = description,
        tools = name_list(tool_names),
        instructions = format_instructions::<TaskPlanning>(),
    )
}

pub fn bundler_user_message(description: &str) -> String {
    format!("Plan tasks for: {}", description)
}

/// One line per route: 1-based position, id, description, tools.
fn routes_context(routes: &[Route]) -> String {
    routes
        .iter()
        .enumerate()
        .map(|(i, route)| {
            format!(
                "Route {} (ID: {}): {} (Tools: {})",
                i + 1,
                route.id,
                route.task_description,
                name_list(&route.tool_sequence)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn executor_prompt(
    routes: &[Route],
    request: &str,
    bundle_description: &str,
    tool_names: &[String],
) -> String {
    format!(
        r#"You are an MCP executor agent. You have access to these pre-defined routes:

{routes}

For the user request: "{request}"

1. First check if any existing route matches the request
2. If yes, execute that route using the specified tools and set matched_route=true, route_used=route_id
3. If no route matches, create a new route and execute it, set matched_route=false, new_route_created=true

Bundle description: {bundle_description}
Available tools: {tools}

Execute the request and provide the structured output.

{instructions}"#,
        routes = routes_context(routes),
        request = request,
        bundle_description = bundle_description,
        tools = name_list(tool_names),
        instructions = format_instructions::<RouteExecution>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, description: &str, tools: &[&str]) -> Route {
        Route {
            id: id.into(),
            bundle_id: "b".into(),
            task_description: description.into(),
            tool_sequence: tools.iter().map(|t| t.to_string()).collect(),
            notes: String::new(),
            execution_order: 0,
            mcp_tools: vec![],
        }
    }

    #[test]
    fn routes_are_numbered_from_one() {
        let routes = vec![
            route("r-a", "Fetch issues", &["list_issues"]),
            route("r-b", "Summarise", &["read", "summarise"]),
        ];
        let context = routes_context(&routes);
        assert_eq!(
            context,
            "Route 1 (ID: r-a): Fetch issues (Tools: [\"list_issues\"])\n\
             Route 2 (ID: r-b): Summarise (Tools: [\"read\", \"summarise\"])"
        );
    }

    #[test]
    fn bundler_prompt_lists_tools_and_schema() {
        let prompt = bundler_prompt("triage inbox", &["search".into(), "label".into()]);
        assert!(prompt.contains("Analyze the description: \"triage inbox\""));
        assert!(prompt.contains("Available tools: [\"search\", \"label\"]"));
        assert!(prompt.contains("\"tool_sequence\""));
    }

    #[test]
    fn executor_prompt_carries_request_and_schema() {
        let prompt = executor_prompt(&[], "archive spam", "mail bundle", &[]);
        assert!(prompt.contains("For the user request: \"archive spam\""));
        assert!(prompt.contains("Bundle description: mail bundle"));
        assert!(prompt.contains("\"execution_result\""));
    }
}
