//! `mp-mcp-client`: pooled MCP (Model Context Protocol) client sessions.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types and a [`Client`] that performs the MCP
//!   handshake over any [`Transport`] (stdio, in-memory, streamable HTTP,
//!   legacy SSE).
//! - A [`SessionManager`] that hands out one long-lived session per
//!   distinct caller header set, recreating sessions that stop answering
//!   pings.
//! - An [`McpManager`] holding one pool per configured server.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mp_mcp_client::{CallContext, Headers, McpManager};
//!
//! let manager = McpManager::from_config(&config.mcp);
//! let ctx = CallContext::with_timeout_from_now(Duration::from_secs(10));
//! let headers = Headers::from([("Authorization".into(), "Bearer t".into())]);
//!
//! for tool in manager.list_tools(&ctx, "remote", &headers).await? {
//!     println!("{}", tool.name);
//! }
//! let result = manager
//!     .call_tool(&ctx, "remote", &headers, "read_file", json!({"path": "/tmp/test.txt"}))
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod session;
pub mod session_key;
pub mod session_manager;
pub mod transport;

// Re-exports for convenience.
pub use config::{McpConfig, McpServerConfig, McpTransportKind};
pub use context::CallContext;
pub use error::{CloseErrors, McpError};
pub use manager::McpManager;
pub use protocol::{Implementation, McpToolDef, ToolCallResult};
pub use session::{Client, ClientSession};
pub use session_key::{session_key, DEFAULT_SESSION_KEY};
pub use session_manager::{is_session_valid, SessionEntry, SessionManager, DEFAULT_PING_TIMEOUT};
pub use transport::{bind_headers, Headers, HttpClient, Transport, TransportError};
