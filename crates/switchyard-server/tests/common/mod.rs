//! Shared fixtures: an in-memory store, a scripted model, and canned tools.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use switchyard_agent::Agent;
use switchyard_core::{AgentError, McpRecord, ToolCall, ToolSchema, Turn};
use switchyard_llm::{ChatModel, ChatResponse, LlmMetrics, LlmResponse};
use switchyard_server::{create_router, ServerState};
use switchyard_store::{SqliteStore, Store};
use switchyard_tools::{Tool, ToolError, ToolProvider, ToolRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// Model
// ─────────────────────────────────────────────────────────────────────────────

/// Replays queued responses, then repeats `default` forever.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<ChatResponse>>,
    default: Mutex<Option<String>>,
    pub calls: AtomicUsize,
    pub system_prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(Some(text.to_string())),
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(responses: Vec<ChatResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            default: Mutex::new(None),
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Changes the repeated reply, e.g. once generated ids are known.
    pub fn reply_with(&self, text: &str) {
        *self.default.lock().unwrap() = Some(text.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat_with_tools(
        &self,
        system_prompt: &str,
        _turns: &[Turn],
        _tools: &[ToolSchema],
    ) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.system_prompts.lock().unwrap().push(system_prompt.to_string());

        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return Ok(next);
        }
        self.default
            .lock()
            .unwrap()
            .as_deref()
            .map(content)
            .ok_or_else(|| AgentError::LlmError("model unavailable".into()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn content(text: &str) -> ChatResponse {
    ChatResponse::Content(LlmResponse {
        content: text.to_string(),
        metrics: LlmMetrics::default(),
    })
}

pub fn tool_call(id: &str, name: &str) -> ChatResponse {
    ChatResponse::ToolCalls {
        calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: serde_json::json!({}),
        }],
        text: None,
        metrics: LlmMetrics::default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

pub struct StubTool {
    name: String,
    pub runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} done", self.name))
    }
}

/// Hands out the same tool names for any set of records, or fails every load.
pub struct StaticTools {
    names: Vec<String>,
    fail: bool,
    pub loads: AtomicUsize,
    pub tool_runs: Arc<AtomicUsize>,
    pub last_records: Mutex<Vec<McpRecord>>,
}

impl StaticTools {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            fail: false,
            loads: AtomicUsize::new(0),
            tool_runs: Arc::new(AtomicUsize::new(0)),
            last_records: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }
}

#[async_trait]
impl ToolProvider for StaticTools {
    async fn load(&self, records: &[McpRecord]) -> Result<ToolRegistry, ToolError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_records.lock().unwrap() = records.to_vec();

        if self.fail {
            return Err(ToolError::ExecutionFailed("connection refused".into()));
        }

        let mut registry = ToolRegistry::new();
        for name in &self.names {
            registry.register(StubTool {
                name: name.clone(),
                runs: Arc::clone(&self.tool_runs),
            });
        }
        Ok(registry)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App
// ─────────────────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub model: Arc<ScriptedModel>,
    pub tools: Arc<StaticTools>,
}

impl TestApp {
    pub fn new(model: ScriptedModel, tools: StaticTools) -> Self {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let model = Arc::new(model);
        let tools = Arc::new(tools);

        let store_handle: Arc<dyn Store> = store.clone();
        let model_handle: Arc<dyn ChatModel> = model.clone();
        let tools_handle: Arc<dyn ToolProvider> = tools.clone();

        let state = Arc::new(ServerState {
            store: store_handle,
            tools: tools_handle,
            agent: Agent::new(model_handle, 5),
        });

        Self {
            router: create_router(state),
            store,
            model,
            tools,
        }
    }

    /// Registers one stdio tool server per name and returns their ids.
    pub async fn seed_mcps(&self, names: &[&str]) -> Vec<String> {
        let mut ids = Vec::new();
        for name in names {
            let record = self
                .store
                .insert_mcp(name, &serde_json::json!({"transport": "stdio", "command": format!("mcp-{name}")}))
                .await
                .unwrap();
            ids.push(record.id);
        }
        ids
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        send(self.router.clone(), request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(self.router.clone(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
