//! MCP client and client sessions.
//!
//! [`Client::connect`] opens a connection over a [`Transport`] and runs the
//! MCP handshake; the resulting [`ClientSession`] is shared behind an
//! `Arc` and stays usable until it is closed or its connection dies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::context::CallContext;
use crate::error::McpError;
use crate::protocol::{self, Implementation, InitializeResult, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{Connection, Transport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Establishes sessions on behalf of one client implementation.
#[derive(Debug, Clone)]
pub struct Client {
    info: Implementation,
}

impl Client {
    pub fn new(info: Implementation) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Open a connection over `transport` and perform the MCP handshake:
    /// `initialize`, then `notifications/initialized`.
    ///
    /// If the handshake fails the connection is closed before returning.
    pub async fn connect(&self, ctx: &CallContext, transport: &dyn Transport) -> Result<Arc<ClientSession>, McpError> {
        let connection = ctx.run(async { Ok(transport.connect().await?) }).await?;

        match self.handshake(ctx, connection.as_ref()).await {
            Ok(init) => {
                tracing::debug!(
                    server = %init.server_info.name,
                    server_version = %init.server_info.version,
                    protocol_version = %init.protocol_version,
                    "MCP session initialized"
                );
                Ok(Arc::new(ClientSession {
                    connection,
                    init,
                    closed: AtomicBool::new(false),
                }))
            }
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    tracing::debug!(error = %close_err, "error closing connection after failed handshake");
                }
                Err(e)
            }
        }
    }

    async fn handshake(&self, ctx: &CallContext, connection: &dyn Connection) -> Result<InitializeResult, McpError> {
        let params = serde_json::to_value(protocol::initialize_params(&self.info))
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let result = ctx
            .run(async {
                let resp = connection.send_request("initialize", Some(params)).await?;
                resp.into_result().map_err(McpError::Rpc)
            })
            .await?;

        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse initialize result: {e}")))?;

        ctx.run(async {
            connection.send_notification("notifications/initialized").await?;
            Ok(())
        })
        .await?;

        Ok(init)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ClientSession
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An initialized MCP session.
pub struct ClientSession {
    connection: Box<dyn Connection>,
    init: InitializeResult,
    closed: AtomicBool,
}

impl ClientSession {
    /// What the server reported about itself during `initialize`.
    pub fn server_info(&self) -> &Implementation {
        &self.init.server_info
    }

    pub fn initialize_result(&self) -> &InitializeResult {
        &self.init
    }

    /// True once [`close`](Self::close) was called or the connection died.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || !self.connection.is_alive()
    }

    /// Round-trip a `ping` request.
    pub async fn ping(&self, ctx: &CallContext) -> Result<(), McpError> {
        self.request(ctx, "ping", None).await.map(|_| ())
    }

    pub async fn list_tools(&self, ctx: &CallContext) -> Result<Vec<McpToolDef>, McpError> {
        let result = self.request(ctx, "tools/list", None).await?;
        serde_json::from_value::<ToolsListResult>(result)
            .map(|r| r.tools)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/list result: {e}")))
    }

    pub async fn call_tool(&self, ctx: &CallContext, tool_name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });
        let result = self.request(ctx, "tools/call", Some(params)).await?;
        serde_json::from_value::<ToolCallResult>(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    /// Close the session. Closing an already closed session is a no-op.
    pub async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connection.close().await?;
        Ok(())
    }

    async fn request(&self, ctx: &CallContext, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::SessionClosed);
        }
        ctx.run(async {
            let resp = self.connection.send_request(method, params).await?;
            resp.into_result().map_err(McpError::Rpc)
        })
        .await
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("server", &self.init.server_info)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
