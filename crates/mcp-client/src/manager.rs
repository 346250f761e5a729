//! MCP manager: one session pool per configured server, plus tool
//! discovery and dispatch on top of the pooled sessions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use mp_domain::config::{McpConfig, McpServerConfig, McpTransportKind};

use crate::context::CallContext;
use crate::error::McpError;
use crate::protocol::{Implementation, McpToolDef, ToolCallResult};
use crate::session::{Client, ClientSession};
use crate::session_manager::SessionManager;
use crate::transport::{CommandTransport, Headers, SseTransport, StreamableHttpTransport, Transport};

/// Build the transport described by one server entry.
pub fn transport_for(config: &McpServerConfig) -> Arc<dyn Transport> {
    match config.transport {
        McpTransportKind::Stdio => Arc::new(CommandTransport::from_config(config)),
        McpTransportKind::Sse => Arc::new(SseTransport::from_config(config)),
        McpTransportKind::StreamableHttp => Arc::new(StreamableHttpTransport::from_config(config)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds a [`SessionManager`] for every configured MCP server.
///
/// Nothing is connected up front: each pool opens its sessions on the
/// first call that needs them.
#[derive(Debug, Default)]
pub struct McpManager {
    pools: HashMap<String, SessionManager>,
}

impl McpManager {
    /// Create an empty manager (no MCP servers configured).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build one pool per server entry.
    ///
    /// Entries repeating an earlier id are logged and skipped.
    pub fn from_config(config: &McpConfig) -> Self {
        let client = Client::new(Implementation::new(&config.client_name, env!("CARGO_PKG_VERSION")));
        let mut manager = Self::empty();

        for server in &config.servers {
            if manager.pools.contains_key(&server.id) {
                tracing::warn!(server_id = %server.id, "duplicate MCP server id, skipping");
                continue;
            }
            tracing::info!(
                server_id = %server.id,
                transport = ?server.transport,
                "registering MCP server"
            );
            let pool = SessionManager::new(client.clone(), transport_for(server))
                .with_ping_timeout(server.ping_timeout());
            manager.pools.insert(server.id.clone(), pool);
        }

        if !manager.pools.is_empty() {
            tracing::info!(count = manager.pools.len(), "MCP manager ready");
        }
        manager
    }

    /// Register a pool under `server_id`, replacing any previous one.
    pub fn insert(&mut self, server_id: impl Into<String>, pool: SessionManager) {
        self.pools.insert(server_id.into(), pool);
    }

    /// The pool for `server_id`.
    pub fn pool(&self, server_id: &str) -> Result<&SessionManager, McpError> {
        self.pools
            .get(server_id)
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))
    }

    /// A live session on `server_id` for the caller identified by `headers`.
    pub async fn session(&self, ctx: &CallContext, server_id: &str, headers: &Headers) -> Result<Arc<ClientSession>, McpError> {
        self.pool(server_id)?.get_session(ctx, headers).await
    }

    pub async fn ping(&self, ctx: &CallContext, server_id: &str, headers: &Headers) -> Result<(), McpError> {
        self.session(ctx, server_id, headers).await?.ping(ctx).await
    }

    pub async fn list_tools(&self, ctx: &CallContext, server_id: &str, headers: &Headers) -> Result<Vec<McpToolDef>, McpError> {
        let tools = self.session(ctx, server_id, headers).await?.list_tools(ctx).await?;
        tracing::debug!(server_id, tool_count = tools.len(), "listed MCP tools");
        Ok(tools)
    }

    /// Call a tool on a specific server.
    pub async fn call_tool(
        &self,
        ctx: &CallContext,
        server_id: &str,
        headers: &Headers,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let session = self.session(ctx, server_id, headers).await?;
        let result = session.call_tool(ctx, tool_name, arguments).await?;
        if result.is_error {
            tracing::debug!(server_id, tool = tool_name, "MCP tool reported an error");
        }
        Ok(result)
    }

    /// Configured server ids, sorted.
    pub fn server_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Return the number of configured servers.
    pub fn server_count(&self) -> usize {
        self.pools.len()
    }

    /// Check if there are any configured servers.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Close every pool concurrently. Failures are logged, not returned.
    pub async fn shutdown(&self) {
        let futs: Vec<_> = self
            .pools
            .iter()
            .map(|(id, pool)| async move {
                tracing::info!(server_id = %id, "closing MCP sessions");
                if let Err(e) = pool.close().await {
                    tracing::warn!(server_id = %id, error = %e, "error closing MCP sessions");
                }
            })
            .collect();
        futures_util::future::join_all(futs).await;
    }
}
