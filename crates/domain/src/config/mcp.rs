//! MCP (Model Context Protocol) configuration types for the domain layer.
//!
//! These are lightweight config structs used to deserialize the `[mcp]`
//! section of the config file. The session pool and transports live in
//! the `mp-mcp-client` crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Top-level MCP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Name announced to servers in `initialize`.
    #[serde(default = "d_client_name")]
    pub client_name: String,

    /// List of MCP server definitions.
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            client_name: d_client_name(),
            servers: Vec::new(),
        }
    }
}

/// Configuration for a single MCP server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique identifier for this server.
    pub id: String,

    /// Transport type (`"stdio"`, `"sse"` or `"streamable_http"`).
    #[serde(default)]
    pub transport: McpTransportKind,

    /// The command to spawn (e.g. `"npx"`). Stdio only.
    #[serde(default)]
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Optional environment variables to set on the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Endpoint URL for the HTTP transports.
    #[serde(default)]
    pub url: Option<String>,

    /// Upper bound on a single request/response cycle.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Liveness probe bound, applied when the caller has no deadline.
    #[serde(default = "d_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Whole-exchange timeout for the underlying HTTP client.
    #[serde(default)]
    pub http_timeout_ms: Option<u64>,

    /// Redirect limit for the HTTP client (`0` disables redirects).
    #[serde(default)]
    pub max_redirects: Option<usize>,
}

impl McpServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_ms.map(Duration::from_millis)
    }
}

/// Transport kind for connecting to an MCP server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportKind {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

fn d_client_name() -> String {
    "mcpool".into()
}

fn d_request_timeout_ms() -> u64 {
    30_000
}

fn d_ping_timeout_ms() -> u64 {
    2_000
}
