//! MCP configuration types, re-exported from `mp-domain`.
//!
//! The canonical definitions live in `mp_domain::config` so the binary's
//! config loader does not need the full client crate.

pub use mp_domain::config::{McpConfig, McpServerConfig, McpTransportKind};
