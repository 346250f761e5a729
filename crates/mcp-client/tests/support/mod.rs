//! Shared fixtures: an in-process MCP server and a fake HTTP endpoint
//! that fronts it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;

use mp_mcp_client::protocol::{Implementation, JsonRpcRequest, JsonRpcResponse};
use mp_mcp_client::transport::{
    Exchange, HttpClient, InMemoryTransport, RequestHandler, StreamableHttpTransport, TransportError,
};
use mp_mcp_client::{Client, Headers, SessionManager};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stub MCP server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Minimal MCP server with knobs for the failure modes the pool handles.
#[derive(Default)]
pub struct StubServer {
    initializations: AtomicUsize,
    pub hang_ping: AtomicBool,
    pub reject_initialize: AtomicBool,
    init_delay: Duration,
}

impl StubServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Slow down `initialize` to widen race windows.
    pub fn with_init_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            init_delay: delay,
            ..Self::default()
        })
    }

    /// How many `initialize` requests were answered successfully.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestHandler for StubServer {
    async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        match req.method.as_str() {
            "initialize" => {
                if !self.init_delay.is_zero() {
                    tokio::time::sleep(self.init_delay).await;
                }
                if self.reject_initialize.load(Ordering::SeqCst) {
                    return JsonRpcResponse::failure(req.id, -32603, "initialization refused");
                }
                self.initializations.fetch_add(1, Ordering::SeqCst);
                JsonRpcResponse::success(
                    req.id,
                    serde_json::json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": "stub", "version": "1.0.0" }
                    }),
                )
            }
            "ping" => {
                if self.hang_ping.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                JsonRpcResponse::success(req.id, serde_json::json!({}))
            }
            "tools/list" => JsonRpcResponse::success(
                req.id,
                serde_json::json!({
                    "tools": [{
                        "name": "echo",
                        "description": "Echo the text argument",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "text": { "type": "string" } }
                        }
                    }]
                }),
            ),
            "tools/call" => {
                let params = req.params.unwrap_or(Value::Null);
                if params["name"] != "echo" {
                    return JsonRpcResponse::success(
                        req.id,
                        serde_json::json!({
                            "content": [{ "type": "text", "text": "unknown tool" }],
                            "isError": true
                        }),
                    );
                }
                let text = params["arguments"]["text"].as_str().unwrap_or_default().to_string();
                JsonRpcResponse::success(
                    req.id,
                    serde_json::json!({ "content": [{ "type": "text", "text": text }] }),
                )
            }
            _ => JsonRpcResponse::failure(req.id, -32601, "Method not found"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fake streamable HTTP endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the fake endpoint saw for one exchange.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub rpc_method: Option<String>,
    pub authorization: Option<String>,
    pub session_id: Option<String>,
}

/// Serves the streamable HTTP protocol from memory, backed by a [`StubServer`].
pub struct MockHttpServer {
    pub server: Arc<StubServer>,
    next_session: AtomicUsize,
    pub seen: Mutex<Vec<SeenRequest>>,
    /// Status returned for `DELETE`.
    pub delete_status: Mutex<u16>,
    /// Answer requests as `text/event-stream` instead of JSON.
    pub stream_responses: AtomicBool,
    /// Deliver event-stream bodies in chunks of this many bytes.
    pub chunk_size: Mutex<Option<usize>>,
    /// Session ids the endpoint no longer recognises.
    expired: Mutex<Vec<String>>,
}

impl MockHttpServer {
    pub fn new(server: Arc<StubServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            next_session: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delete_status: Mutex::new(200),
            stream_responses: AtomicBool::new(false),
            chunk_size: Mutex::new(None),
            expired: Mutex::new(Vec::new()),
        })
    }

    /// Forget `session_id`: later requests carrying it get a 404.
    pub fn expire(&self, session_id: &str) {
        self.expired.lock().push(session_id.to_string());
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }
}

fn respond(status: u16, content_type: Option<&str>, session_id: Option<&str>, body: String) -> reqwest::Response {
    let mut builder = http::Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    if let Some(id) = session_id {
        builder = builder.header("mcp-session-id", id);
    }
    reqwest::Response::from(builder.body(body).expect("valid mock response"))
}

/// An event-stream response whose body arrives `size` bytes at a time.
fn respond_chunked(session_id: Option<&str>, body: String, size: usize) -> reqwest::Response {
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = body.as_bytes().chunks(size).map(|c| Ok(c.to_vec())).collect();
    let mut builder = http::Response::builder()
        .status(200)
        .header("content-type", "text/event-stream");
    if let Some(id) = session_id {
        builder = builder.header("mcp-session-id", id);
    }
    let body = reqwest::Body::wrap_stream(futures_util::stream::iter(chunks));
    reqwest::Response::from(builder.body(body).expect("valid mock response"))
}

#[async_trait]
impl Exchange for MockHttpServer {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let body: Option<Value> = request
            .body()
            .and_then(|b| b.as_bytes())
            .and_then(|b| serde_json::from_slice(b).ok());
        let session_id = header("mcp-session-id");

        self.seen.lock().push(SeenRequest {
            method: request.method().clone(),
            rpc_method: body
                .as_ref()
                .and_then(|v| v.get("method"))
                .and_then(Value::as_str)
                .map(str::to_string),
            authorization: header("authorization"),
            session_id: session_id.clone(),
        });

        if *request.method() == Method::DELETE {
            let status = *self.delete_status.lock();
            return Ok(respond(status, None, None, String::new()));
        }
        if session_id.as_ref().is_some_and(|id| self.expired.lock().contains(id)) {
            return Ok(respond(404, None, None, "unknown session".into()));
        }

        let body = body.ok_or_else(|| TransportError::Protocol("mock expected a JSON body".into()))?;
        if body.get("id").is_none() {
            return Ok(respond(202, None, None, String::new()));
        }

        let req: JsonRpcRequest = serde_json::from_value(body)?;
        let assigned = (req.method == "initialize")
            .then(|| format!("session-{}", self.next_session.fetch_add(1, Ordering::SeqCst) + 1));
        let resp = self.server.handle_request(req).await;
        let json = serde_json::to_string(&resp)?;

        if self.stream_responses.load(Ordering::SeqCst) {
            let events = format!(
                "event: message\ndata: {{\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}}\n\nevent: message\ndata: {json}\n\n"
            );
            match *self.chunk_size.lock() {
                Some(size) => Ok(respond_chunked(assigned.as_deref(), events, size)),
                None => Ok(respond(200, Some("text/event-stream"), assigned.as_deref(), events)),
            }
        } else {
            Ok(respond(200, Some("application/json"), assigned.as_deref(), json))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn client() -> Client {
    Client::new(Implementation::new("test_client", "v1.0.0"))
}

/// A pool over an in-process (header-insensitive) transport.
pub fn in_memory_pool(server: Arc<StubServer>) -> SessionManager {
    SessionManager::new(client(), Arc::new(InMemoryTransport::new(server)))
}

/// A pool over streamable HTTP whose exchanges land on `mock`.
pub fn http_pool(mock: Arc<MockHttpServer>) -> SessionManager {
    let exchange: Arc<dyn Exchange> = mock;
    let transport = StreamableHttpTransport::new("http://mcp.test/mcp").with_http_client(HttpClient {
        exchange: Some(exchange),
        ..HttpClient::default()
    });
    SessionManager::new(client(), Arc::new(transport))
}

pub fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
