//! Streamable HTTP transport.
//!
//! Every client message is POSTed to a single endpoint. The server answers
//! a request either with a JSON body or with a short event stream that
//! ends in the response. The `Mcp-Session-Id` returned by `initialize` is
//! echoed on every later message and used to `DELETE` the session on close.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use mp_domain::config::McpServerConfig;

use super::http::{Dispatcher, HttpClient};
use super::sse::EventBuffer;
use super::{Connection, HeaderInjection, Transport, TransportError};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Debug, Clone)]
pub struct StreamableHttpTransport {
    pub endpoint: String,
    pub http_client: Option<HttpClient>,
    pub request_timeout: Duration,
}

impl StreamableHttpTransport {
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
impl Transport for StreamableHttpTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        let endpoint =
            Url::parse(&self.endpoint).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        Ok(Box::new(StreamableConnection {
            endpoint,
            dispatcher: self.http_client.clone().unwrap_or_default().dispatcher(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            request_timeout: self.request_timeout,
        }))
    }

    fn header_injection(&self) -> Option<&dyn HeaderInjection> {
        Some(self)
    }
}

impl HeaderInjection for StreamableHttpTransport {
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

struct StreamableConnection {
    endpoint: Url,
    dispatcher: Dispatcher,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    alive: AtomicBool,
    request_timeout: Duration,
}

impl StreamableConnection {
    fn request(&self, method: Method) -> Result<reqwest::Request, TransportError> {
        let mut req = reqwest::Request::new(method, self.endpoint.clone());
        let session_id = self.session_id.lock().clone();
        if let Some(id) = session_id {
            let value = HeaderValue::from_str(&id)
                .map_err(|_| TransportError::InvalidHeader(SESSION_ID_HEADER.into()))?;
            req.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Ok(req)
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, TransportError> {
        let mut req = self.request(Method::POST)?;
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));
        *req.body_mut() = Some(body.into());

        let resp = self.dispatcher.execute(req).await?;

        if resp.status() == StatusCode::NOT_FOUND && self.session_id.lock().is_some() {
            self.alive.store(false, Ordering::SeqCst);
            return Err(TransportError::SessionExpired);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        if let Some(id) = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.lock();
            if current.as_deref() != Some(id) {
                tracing::debug!(session_id = %id, "server assigned MCP session id");
                *current = Some(id.to_string());
            }
        }

        Ok(resp)
    }

    async fn read_response(&self, resp: reqwest::Response, id: u64) -> Result<JsonRpcResponse, TransportError> {
        let is_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if !is_stream {
            let body = resp.text().await?;
            return match JsonRpcResponse::from_message(&body) {
                Some(r) if r.id == id => Ok(r),
                _ => Err(TransportError::Protocol(format!("no response for request {id} in body"))),
            };
        }

        let mut resp = resp;
        let mut buffer = EventBuffer::default();
        loop {
            let chunk = resp.chunk().await?;
            let finished = chunk.is_none();
            match chunk {
                Some(bytes) => buffer.push(&bytes),
                None => buffer.finish(),
            }
            for event in buffer.events() {
                if let Some(r) = JsonRpcResponse::from_message(&event.data) {
                    if r.id == id {
                        return Ok(r);
                    }
                }
            }
            if finished {
                return Err(TransportError::Protocol(format!(
                    "event stream ended before response to request {id}"
                )));
            }
        }
    }
}

#[async_trait]
impl Connection for StreamableConnection {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        tracing::debug!(id, method, endpoint = %self.endpoint, "sending MCP request");
        let result = tokio::time::timeout(self.request_timeout, async {
            let resp = self.post(json).await?;
            self.read_response(resp, id).await
        })
        .await;

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
        self.post(json).await.map(|_| ())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if self.session_id.lock().is_none() {
            return Ok(());
        }

        let req = self.request(Method::DELETE)?;
        let resp = self.dispatcher.execute(req).await?;
        let status = resp.status();
        // 405: the server does not let clients terminate sessions.
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
