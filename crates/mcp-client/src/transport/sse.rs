//! Legacy HTTP+SSE transport.
//!
//! The client opens a long-lived `GET` event stream. The server's first
//! event (`endpoint`) names the URL messages are POSTed to; responses come
//! back over the stream as `message` events and are routed to the waiting
//! request by id. When the stream ends the connection is dead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use mp_domain::config::McpServerConfig;

use super::http::{Dispatcher, HttpClient};
use super::{Connection, HeaderInjection, Transport, TransportError};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event-stream parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Extract complete events from an SSE buffer.
///
/// Events are delimited by a blank line. Multiple `data:` lines are joined
/// with `\n`; `id:`, `retry:` and comment lines are ignored. The buffer is
/// drained in place and any trailing partial event stays for the next call.
fn drain_events(buffer: &mut String) -> Vec<SseEvent> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    let mut events = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push(value.strip_prefix(' ').unwrap_or(value));
            }
        }
        if data.is_empty() {
            continue;
        }
        events.push(SseEvent {
            event: event.unwrap_or_else(|| "message".into()),
            data: data.join("\n"),
        });
    }
    events
}

/// Byte-level accumulator for an event stream.
///
/// Network chunks may end inside a multi-byte character; the incomplete
/// tail is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub(crate) struct EventBuffer {
    text: String,
    partial: Vec<u8>,
}

impl EventBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.partial) {
                Ok(decoded) => {
                    self.text.push_str(decoded);
                    self.partial.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(std::str::from_utf8(&self.partial[..valid]).unwrap_or_default());
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.partial.drain(..valid);
                            return;
                        }
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.partial.drain(..valid + invalid);
                        }
                    }
                }
            }
        }
    }

    /// The stream ended: flush leftover bytes and a final event that lacks
    /// its trailing blank line.
    pub fn finish(&mut self) {
        if !self.partial.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.partial));
            self.partial.clear();
        }
        self.text.push_str("\n\n");
    }

    pub fn events(&mut self) -> Vec<SseEvent> {
        drain_events(&mut self.text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SseTransport {
    pub endpoint: String,
    pub http_client: Option<HttpClient>,
    pub request_timeout: Duration,
}

impl SseTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn from_config(config: &McpServerConfig) -> Self {
        Self {
            endpoint: config.url.clone().unwrap_or_default(),
            http_client: Some(HttpClient {
                redirect: config.max_redirects.into(),
                timeout: config.http_timeout(),
                ..HttpClient::default()
            }),
            request_timeout: config.request_timeout(),
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        let stream_url =
            Url::parse(&self.endpoint).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        let dispatcher = self.http_client.clone().unwrap_or_default().dispatcher();

        let mut req = reqwest::Request::new(Method::GET, stream_url.clone());
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let resp = dispatcher.execute(req).await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            alive: AtomicBool::new(true),
        });
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        // Until the connection owns it, the reader dies with this future.
        let reader = ReaderGuard(Some(tokio::spawn(read_stream(resp, Arc::clone(&shared), endpoint_tx))));

        let post_path = match tokio::time::timeout(self.request_timeout, endpoint_rx).await {
            Ok(Ok(path)) => path,
            Ok(Err(_)) => {
                return Err(TransportError::Protocol(
                    "event stream ended before the endpoint event".into(),
                ))
            }
            Err(_) => return Err(TransportError::Timeout),
        };
        let post_url = stream_url
            .join(post_path.trim())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{post_path}: {e}")))?;

        tracing::debug!(endpoint = %self.endpoint, post_url = %post_url, "SSE stream established");

        Ok(Box::new(SseConnection {
            post_url,
            dispatcher,
            shared,
            reader: Mutex::new(reader.into_inner()),
            next_id: AtomicU64::new(1),
            request_timeout: self.request_timeout,
        }))
    }

    fn header_injection(&self) -> Option<&dyn HeaderInjection> {
        Some(self)
    }
}

impl HeaderInjection for SseTransport {
    fn http_client(&self) -> Option<&HttpClient> {
        self.http_client.as_ref()
    }

    fn with_http_client(&self, client: HttpClient) -> Arc<dyn Transport> {
        Arc::new(Self {
            endpoint: self.endpoint.clone(),
            http_client: Some(client),
            request_timeout: self.request_timeout,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// State shared between the connection and its stream reader.
struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>,
    alive: AtomicBool,
}

impl Shared {
    fn shut(&self) {
        self.alive.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with `Closed`.
        self.pending.lock().clear();
    }

    /// Register a waiter for response `id`.
    ///
    /// `alive` is checked after the insert: `shut` clears `pending` only
    /// after flipping it, so a waiter is either cleared or refused here.
    fn register(&self, id: u64) -> Result<oneshot::Receiver<JsonRpcResponse>, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        if !self.alive.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(TransportError::Closed);
        }
        Ok(rx)
    }
}

/// Aborts the stream reader on drop unless handed over.
struct ReaderGuard(Option<JoinHandle<()>>);

impl ReaderGuard {
    fn into_inner(mut self) -> Option<JoinHandle<()>> {
        self.0.take()
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        if let Some(reader) = self.0.take() {
            reader.abort();
        }
    }
}

async fn read_stream(
    mut response: reqwest::Response,
    shared: Arc<Shared>,
    endpoint_tx: oneshot::Sender<String>,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut buffer = EventBuffer::default();

    loop {
        match response.chunk().await {
            Ok(Some(bytes)) => {
                buffer.push(&bytes);
                for event in buffer.events() {
                    match event.event.as_str() {
                        "endpoint" => {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(event.data);
                            }
                        }
                        "message" => match JsonRpcResponse::from_message(&event.data) {
                            Some(resp) => {
                                if let Some(tx) = shared.pending.lock().remove(&resp.id) {
                                    let _ = tx.send(resp);
                                }
                            }
                            None => {
                                tracing::debug!(data = %event.data, "ignoring non-response SSE message");
                            }
                        },
                        other => tracing::debug!(event = other, "ignoring SSE event"),
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "SSE stream failed");
                break;
            }
        }
    }

    tracing::debug!("SSE stream ended");
    shared.shut();
}

struct SseConnection {
    post_url: Url,
    dispatcher: Dispatcher,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl SseConnection {
    async fn post(&self, body: String) -> Result<(), TransportError> {
        let mut req = reqwest::Request::new(Method::POST, self.post_url.clone());
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        let resp = self.dispatcher.execute(req).await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for SseConnection {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        let rx = self.shared.register(id)?;

        tracing::debug!(id, method, "sending MCP request over SSE");
        let result = tokio::time::timeout(self.request_timeout, async {
            self.post(json).await?;
            rx.await.map_err(|_| TransportError::Closed)
        })
        .await;

        self.shared.pending.lock().remove(&id);
        match result {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.post(json).await
    }

    fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.shared.shut();
        Ok(())
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
