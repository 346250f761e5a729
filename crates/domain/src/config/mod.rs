mod mcp;
mod observability;

pub use mcp::*;
pub use observability::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a TOML document into a [`Config`], filling in defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config file at `path`.
    ///
    /// A missing file is not an error: the defaults are returned so the
    /// binary can start with an empty server list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.mcp.servers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "mcp.servers".into(),
                message: "no MCP servers configured".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, server) in self.mcp.servers.iter().enumerate() {
            let field = |name: &str| format!("mcp.servers[{i}].{name}");

            if server.id.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field("id"),
                    message: "id must not be empty".into(),
                });
            } else if !seen.insert(server.id.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field("id"),
                    message: format!("duplicate server id '{}'", server.id),
                });
            }

            match server.transport {
                McpTransportKind::Stdio => {
                    if server.command.trim().is_empty() {
                        errors.push(ConfigError {
                            severity: ConfigSeverity::Error,
                            field: field("command"),
                            message: "stdio transport requires a command".into(),
                        });
                    }
                }
                McpTransportKind::Sse | McpTransportKind::StreamableHttp => {
                    match server.url.as_deref() {
                        None | Some("") => errors.push(ConfigError {
                            severity: ConfigSeverity::Error,
                            field: field("url"),
                            message: "HTTP transports require a url".into(),
                        }),
                        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                            errors.push(ConfigError {
                                severity: ConfigSeverity::Error,
                                field: field("url"),
                                message: format!("url '{url}' must use http or https"),
                            })
                        }
                        Some(_) => {}
                    }
                }
            }

            if server.ping_timeout_ms == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field("ping_timeout_ms"),
                    message: "ping timeout must be greater than 0".into(),
                });
            }

            if server.transport == McpTransportKind::Stdio && server.http_timeout_ms.is_some() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: field("http_timeout_ms"),
                    message: "ignored for stdio transport".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
