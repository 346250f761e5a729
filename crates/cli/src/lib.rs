//! `mcpool`: operator CLI for pooled MCP sessions.

pub mod cli;
