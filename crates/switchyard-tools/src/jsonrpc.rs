//! JSON-RPC 2.0 framing for MCP transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.to_string(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// The request id this answers. Servers may echo numeric ids as strings.
    pub fn request_id(&self) -> Option<u64> {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn is_for(&self, id: u64) -> bool {
        self.request_id() == Some(id)
    }
}

/// A decoded inbound message.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response(JsonRpcResponse),
    /// A request the server sent us; carries its id so it can be answered.
    ServerRequest { id: Value, method: String },
    Notification,
}

/// Classifies a raw JSON message from the server. Returns `None` for non-JSON-RPC text.
pub(crate) fn classify(raw: &str) -> Option<Incoming> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let object = value.as_object()?;

    if let Some(method) = object.get("method").and_then(Value::as_str) {
        return Some(match object.get("id") {
            Some(id) if !id.is_null() => Incoming::ServerRequest {
                id: id.clone(),
                method: method.to_string(),
            },
            _ => Incoming::Notification,
        });
    }

    if object.contains_key("result") || object.contains_key("error") {
        return serde_json::from_value(value).ok().map(Incoming::Response);
    }

    None
}

/// Reply to a server-initiated request: `ping` gets an empty result, anything else is unsupported.
pub(crate) fn reply_to_server_request(id: &Value, method: &str) -> Value {
    if method == "ping" {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} })
    } else {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("Method not found: {}", method) }
        })
    }
}
