//! MCP transport layer.
//!
//! A [`Transport`] describes how to reach a server; [`Transport::connect`]
//! turns it into a live [`Connection`]. Supported variants:
//! - **Stdio** ([`CommandTransport`]): spawn a child process, JSON-RPC over stdin/stdout.
//! - **In-memory** ([`InMemoryTransport`]): an in-process [`RequestHandler`].
//! - **Streamable HTTP** ([`StreamableHttpTransport`]): one POST per message.
//! - **SSE** ([`SseTransport`]): legacy HTTP+SSE, event stream plus POST endpoint.
//!
//! Only the HTTP variants carry per-caller headers; they advertise it via
//! [`Transport::header_injection`].

pub mod http;
pub mod memory;
pub mod sse;
pub mod stdio;
pub mod streamable;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::JsonRpcResponse;

pub use http::{Exchange, HeaderExchange, HttpClient, RedirectPolicy, ReqwestExchange};
pub use memory::{InMemoryTransport, RequestHandler};
pub use sse::SseTransport;
pub use stdio::CommandTransport;
pub use streamable::StreamableHttpTransport;

/// Header name → value, as supplied per call by the dispatch layer.
pub type Headers = HashMap<String, String>;

/// A connect-able description of an MCP server endpoint.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Open a new connection. Each call yields an independent connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Header-sensitive variants return `Some`; for everything else
    /// per-caller headers have no effect on the session.
    fn header_injection(&self) -> Option<&dyn HeaderInjection> {
        None
    }
}

/// Capability implemented by transports whose outgoing HTTP exchanges can
/// carry caller headers.
pub trait HeaderInjection: Send + Sync {
    /// The HTTP client this transport currently uses, if one was configured.
    fn http_client(&self) -> Option<&HttpClient>;

    /// A copy of this transport (same endpoint) that uses `client`.
    fn with_http_client(&self, client: HttpClient) -> Arc<dyn Transport>;
}

/// A live, established link to one MCP server.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the connection is still alive.
    fn is_alive(&self) -> bool;

    /// Release the connection's resources.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Produce the transport a session for `headers` should be established over.
///
/// Header-sensitive transports get a copy whose HTTP client attaches
/// `headers` to every exchange; any other transport is returned as-is.
pub fn bind_headers(base: &Arc<dyn Transport>, headers: &Headers) -> Arc<dyn Transport> {
    match base.header_injection() {
        Some(injectable) => {
            let client = injectable.http_client().cloned().unwrap_or_default();
            injectable.with_http_client(client.with_headers(headers))
        }
        None => Arc::clone(base),
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("MCP server process has exited")]
    ProcessExited,

    #[error("connection is closed")]
    Closed,

    #[error("server no longer recognises the session")]
    SessionExpired,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("transport protocol violation: {0}")]
    Protocol(String),
}
