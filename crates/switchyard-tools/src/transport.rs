//! MCP transports: stdio child process, streamable HTTP, and legacy SSE.
//!
//! Event-stream bodies are decoded with `eventsource-stream` (streamable HTTP)
//! and `reqwest-eventsource` (the long-lived legacy SSE channel), so multi-byte
//! characters split across network chunks survive intact.

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::client::McpClientError;
use crate::jsonrpc::{
    classify, reply_to_server_request, Incoming, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};

/// How long to wait for a single response. Generous for `npx`/`uvx` cold starts.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
const SESSION_HEADER: &str = "mcp-session-id";

/// A bidirectional JSON-RPC channel to one MCP server.
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpClientError>;
    async fn notify(&self, notification: &JsonRpcNotification) -> Result<(), McpClientError>;
}

// ============================================================================
// Stdio
// ============================================================================

struct StdioPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Newline-delimited JSON-RPC over a child's stdin/stdout. The child dies with the transport.
pub(crate) struct StdioTransport {
    _child: Child,
    pipes: Mutex<StdioPipes>,
}

impl StdioTransport {
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, McpClientError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpClientError::SpawnFailed(format!("Failed to spawn '{}': {} (args: {:?})", command, e, args))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("Failed to get stdout".to_string()))?;

        Ok(Self {
            _child: child,
            pipes: Mutex::new(StdioPipes {
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }
}

async fn write_line(stdin: &mut ChildStdin, payload: &str) -> Result<(), McpClientError> {
    stdin.write_all(payload.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

/// Reads stdout until the response for `id`, answering server pings on the way.
async fn read_response(pipes: &mut StdioPipes, id: u64) -> Result<JsonRpcResponse, McpClientError> {
    loop {
        let mut line = String::new();
        if pipes.stdout.read_line(&mut line).await? == 0 {
            return Err(McpClientError::ProtocolError("Server closed connection".to_string()));
        }

        match classify(&line) {
            Some(Incoming::Response(response)) if response.is_for(id) => return Ok(response),
            Some(Incoming::ServerRequest { id, method }) => {
                let reply = reply_to_server_request(&id, &method).to_string();
                write_line(&mut pipes.stdin, &reply).await?;
            }
            Some(_) => {}
            None => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    debug!(line = trimmed, "Skipping non-JSON-RPC output");
                }
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpClientError> {
        let mut pipes = self.pipes.lock().await;
        let payload = serde_json::to_string(request)?;
        write_line(&mut pipes.stdin, &payload).await?;

        let read = read_response(&mut pipes, request.id);
        timeout(RESPONSE_TIMEOUT, read)
            .await
            .map_err(|_| McpClientError::Timeout)?
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> Result<(), McpClientError> {
        let mut pipes = self.pipes.lock().await;
        let payload = serde_json::to_string(notification)?;
        write_line(&mut pipes.stdin, &payload).await
    }
}

// ============================================================================
// Streamable HTTP
// ============================================================================

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, McpClientError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| McpClientError::ProtocolError(format!("Invalid header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| McpClientError::ProtocolError(format!("Invalid header value for '{}': {}", key, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn server_closed() -> McpClientError {
    McpClientError::ProtocolError("Server closed connection".to_string())
}

/// POSTs one JSON-RPC message and checks the status. The body is left unread.
async fn post_message(
    client: &reqwest::Client,
    url: &str,
    headers: &HeaderMap,
    body: &impl Serialize,
) -> Result<reqwest::Response, McpClientError> {
    let response = client.post(url).headers(headers.clone()).json(body).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(McpClientError::ProtocolError(format!("HTTP {} from {}: {}", status, url, body)));
    }
    Ok(response)
}

/// MCP streamable HTTP: every message is a POST; replies are JSON or an event stream.
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    session_id: StdMutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(url: &str, headers: &BTreeMap<String, String>) -> Result<Self, McpClientError> {
        let mut headers = header_map(headers)?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));

        Ok(Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            headers,
            session_id: StdMutex::new(None),
        })
    }

    async fn post(&self, body: &impl Serialize) -> Result<reqwest::Response, McpClientError> {
        let mut headers = self.headers.clone();
        let session = self.session_id.lock().ok().and_then(|s| s.clone());
        if let Some(value) = session.and_then(|s| HeaderValue::from_str(&s).ok()) {
            headers.insert(SESSION_HEADER, value);
        }

        let response = post_message(&self.client, &self.url, &headers, body).await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.lock() {
                *guard = Some(session.to_string());
            }
        }

        Ok(response)
    }

    /// Reads an event-stream body until the response for `id`, answering server requests on the way.
    async fn response_from_event_stream(
        &self,
        response: reqwest::Response,
        id: u64,
    ) -> Result<JsonRpcResponse, McpClientError> {
        let mut events = response.bytes_stream().eventsource();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| McpClientError::ProtocolError(format!("Event stream error: {}", e)))?;
            match classify(&event.data) {
                Some(Incoming::Response(resp)) if resp.is_for(id) => return Ok(resp),
                Some(Incoming::ServerRequest { id: server_id, method }) => {
                    self.post(&reply_to_server_request(&server_id, &method)).await?;
                }
                _ => {}
            }
        }

        Err(McpClientError::ProtocolError(
            "Event stream ended without a response".to_string(),
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpClientError> {
        let response = self.post(request).await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if is_event_stream {
            return self.response_from_event_stream(response, request.id).await;
        }

        let body = response.text().await?;
        match classify(&body) {
            Some(Incoming::Response(resp)) => Ok(resp),
            _ => Err(McpClientError::ProtocolError(format!(
                "Unexpected response body: {}",
                body.chars().take(200).collect::<String>()
            ))),
        }
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> Result<(), McpClientError> {
        self.post(notification).await.map(|_| ())
    }
}

// ============================================================================
// Legacy SSE
// ============================================================================

/// In-flight requests by id. `None` once the event stream has closed.
type Pending = Arc<StdMutex<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;

/// HTTP+SSE transport: a long-lived GET stream carries responses, requests are POSTed
/// to the endpoint announced by the server's first `endpoint` event.
pub(crate) struct SseTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    pending: Pending,
    reader: JoinHandle<()>,
}

impl SseTransport {
    pub async fn connect(url: &str, headers: &BTreeMap<String, String>) -> Result<Self, McpClientError> {
        let client = reqwest::Client::new();
        let headers = header_map(headers)?;
        let base = reqwest::Url::parse(url)
            .map_err(|e| McpClientError::ProtocolError(format!("Invalid SSE url '{}': {}", url, e)))?;

        let mut stream_headers = headers.clone();
        stream_headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let mut source = EventSource::new(client.get(base.clone()).headers(stream_headers))
            .map_err(|_| McpClientError::ProtocolError(format!("Cannot open event stream at {}", url)))?;
        source.set_retry_policy(Box::new(Never));

        let pending: Pending = Arc::new(StdMutex::new(Some(HashMap::new())));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = SseReader {
            client: client.clone(),
            headers: headers.clone(),
            base,
            pending: Arc::clone(&pending),
        };
        let reader = tokio::spawn(reader.run(source, endpoint_tx));

        let endpoint = match timeout(RESPONSE_TIMEOUT, endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(e))) => {
                reader.abort();
                return Err(e);
            }
            Ok(Err(_)) => {
                reader.abort();
                return Err(McpClientError::ProtocolError(
                    "Event stream closed before announcing an endpoint".to_string(),
                ));
            }
            Err(_) => {
                reader.abort();
                return Err(McpClientError::Timeout);
            }
        };
        debug!(endpoint = %endpoint, "SSE endpoint announced");

        Ok(Self {
            client,
            endpoint,
            headers,
            pending,
            reader,
        })
    }

    fn forget(&self, id: u64) {
        if let Ok(mut guard) = self.pending.lock() {
            if let Some(map) = guard.as_mut() {
                map.remove(&id);
            }
        }
    }
}

/// Owns the event stream: routes responses to waiters and answers server requests.
struct SseReader {
    client: reqwest::Client,
    headers: HeaderMap,
    base: reqwest::Url,
    pending: Pending,
}

impl SseReader {
    async fn run(self, mut source: EventSource, endpoint_tx: oneshot::Sender<Result<String, McpClientError>>) {
        let mut endpoint_tx = Some(endpoint_tx);
        let mut endpoint: Option<String> = None;

        while let Some(event) = source.next().await {
            let message = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    let error = McpClientError::ProtocolError(format!("Event stream failed: {}", e));
                    match endpoint_tx.take() {
                        Some(tx) => {
                            let _ = tx.send(Err(error));
                        }
                        None => warn!(error = %error, "SSE event stream failed"),
                    }
                    break;
                }
            };

            if message.event == "endpoint" {
                let resolved = self
                    .base
                    .join(message.data.trim())
                    .map(|url| url.to_string())
                    .map_err(|e| {
                        McpClientError::ProtocolError(format!("Invalid endpoint '{}': {}", message.data, e))
                    });
                if let Ok(url) = &resolved {
                    endpoint = Some(url.clone());
                }
                if let Some(tx) = endpoint_tx.take() {
                    let _ = tx.send(resolved);
                }
                continue;
            }

            match classify(&message.data) {
                Some(Incoming::Response(response)) => self.deliver(response),
                Some(Incoming::ServerRequest { id, method }) => {
                    let Some(url) = endpoint.as_deref() else {
                        continue;
                    };
                    let reply = reply_to_server_request(&id, &method);
                    if let Err(e) = post_message(&self.client, url, &self.headers, &reply).await {
                        warn!(method = %method, error = %e, "Failed to answer server request");
                    }
                }
                _ => {}
            }
        }

        source.close();
        // Dropping the senders fails every in-flight request at once.
        if let Ok(mut guard) = self.pending.lock() {
            guard.take();
        }
        debug!("SSE event stream closed");
    }

    fn deliver(&self, response: JsonRpcResponse) {
        let Some(id) = response.request_id() else {
            return;
        };
        let sender = self
            .pending
            .lock()
            .ok()
            .and_then(|mut guard| guard.as_mut().and_then(|map| map.remove(&id)));
        if let Some(sender) = sender {
            let _ = sender.send(response);
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, McpClientError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self
                .pending
                .lock()
                .map_err(|_| McpClientError::ProtocolError("pending map poisoned".to_string()))?;
            match guard.as_mut() {
                Some(map) => {
                    map.insert(request.id, tx);
                }
                None => return Err(server_closed()),
            }
        }

        if let Err(e) = post_message(&self.client, &self.endpoint, &self.headers, request).await {
            self.forget(request.id);
            return Err(e);
        }

        match timeout(RESPONSE_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(server_closed()),
            Err(_) => {
                self.forget(request.id);
                Err(McpClientError::Timeout)
            }
        }
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> Result<(), McpClientError> {
        post_message(&self.client, &self.endpoint, &self.headers, notification)
            .await
            .map(|_| ())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
