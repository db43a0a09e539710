//! Record shapes the bundler and executor ask the agent for.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::structured::StructuredOutput;

/// One task of a decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task_description: String,
    pub tool_sequence: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// A description broken into tasks, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlanning {
    pub tasks: Vec<PlannedTask>,
}

impl StructuredOutput for TaskPlanning {
    fn name() -> &'static str {
        "TaskPlanning"
    }

    fn schema() -> Value {
        json!({
            "$defs": {
                "Task": {
                    "properties": {
                        "task_description": {"title": "Task Description", "type": "string"},
                        "tool_sequence": {"items": {"type": "string"}, "title": "Tool Sequence", "type": "array"},
                        "notes": {"default": "", "title": "Notes", "type": "string"}
                    },
                    "required": ["task_description", "tool_sequence"],
                    "title": "Task",
                    "type": "object"
                }
            },
            "properties": {
                "tasks": {"items": {"$ref": "#/$defs/Task"}, "title": "Tasks", "type": "array"}
            },
            "required": ["tasks"]
        })
    }
}

/// The executor's self-report after handling a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteExecution {
    pub matched_route: bool,
    #[serde(default)]
    pub route_used: String,
    pub execution_result: String,
    #[serde(default)]
    pub new_route_created: bool,
}

impl StructuredOutput for RouteExecution {
    fn name() -> &'static str {
        "RouteExecution"
    }

    fn schema() -> Value {
        json!({
            "properties": {
                "matched_route": {"title": "Matched Route", "type": "boolean"},
                "route_used": {"default": "", "title": "Route Used", "type": "string"},
                "execution_result": {"title": "Execution Result", "type": "string"},
                "new_route_created": {"default": false, "title": "New Route Created", "type": "boolean"}
            },
            "required": ["matched_route", "execution_result"]
        })
    }
}
