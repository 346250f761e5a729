//! Errors surfaced by sessions, pools and the multi-server manager.

use std::fmt;

use crate::protocol::JsonRpcError;
use crate::transport::TransportError;

/// Errors specific to MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server returned {0}")]
    Rpc(JsonRpcError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("MCP session is closed")]
    SessionClosed,

    #[error("MCP server not found: {0}")]
    ServerNotFound(String),

    #[error("failed to create session: {0}")]
    SessionCreate(#[source] Box<McpError>),

    #[error("errors closing sessions: {0}")]
    CloseSessions(CloseErrors),
}

/// Every failure collected while tearing down a pool.
#[derive(Debug)]
pub struct CloseErrors(pub Vec<McpError>);

impl CloseErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &McpError> {
        self.0.iter()
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        write!(f, "]")
    }
}

impl From<McpError> for mp_domain::error::Error {
    fn from(e: McpError) -> Self {
        match e {
            McpError::DeadlineExceeded => mp_domain::error::Error::Timeout(e.to_string()),
            other => mp_domain::error::Error::Mcp(other.to_string()),
        }
    }
}
