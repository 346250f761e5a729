//! In-process transport.
//!
//! Connects the client straight to a [`RequestHandler`] living in the same
//! process. Useful for embedding a server and for tests. Every `connect`
//! produces an independent connection to the shared handler.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Connection, Transport, TransportError};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Server side of an in-memory connection.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse;

    async fn handle_notification(&self, _notification: JsonRpcNotification) {}
}

#[derive(Clone)]
pub struct InMemoryTransport {
    handler: Arc<dyn RequestHandler>,
}

impl InMemoryTransport {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self { handler }
    }
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        Ok(Box::new(InMemoryConnection {
            handler: Arc::clone(&self.handler),
            next_id: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        }))
    }
}

struct InMemoryConnection {
    handler: Arc<dyn RequestHandler>,
    next_id: AtomicU64,
    alive: AtomicBool,
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self.handler.handle_request(JsonRpcRequest::new(id, method, params)).await;
        if resp.id != id {
            return Err(TransportError::Protocol(format!(
                "response id {} does not match request id {id}",
                resp.id
            )));
        }
        Ok(resp)
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        self.handler.handle_notification(JsonRpcNotification::new(method)).await;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}
