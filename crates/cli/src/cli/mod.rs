pub mod config;
pub mod session;

use clap::{Args, Parser, Subcommand};

use mp_mcp_client::Headers;

/// mcpool: talk to MCP servers through per-caller session pools.
#[derive(Debug, Parser)]
#[command(name = "mcpool", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open (or reuse) a session and ping it.
    Probe(Target),
    /// List the tools a server offers.
    Tools(Target),
    /// Call a tool and print its content.
    Call {
        #[command(flatten)]
        target: Target,
        /// Tool name.
        #[arg(long)]
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Print the full result as JSON instead of its text content.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Which server to reach and as whom.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// Server id from config.toml.
    #[arg(long)]
    pub server: String,
    /// Header sent with every exchange, as `Name: value` (repeatable).
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// Overall deadline for the command, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Target {
    /// Collect the `-H` flags; a repeated name keeps its last value.
    pub fn header_map(&self) -> Headers {
        self.headers.iter().cloned().collect()
    }
}

/// Parse a `Name: value` header flag.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `MCPOOL_CONFIG` (or
/// `config.toml` by default). Returns the parsed config and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(mp_domain::config::Config, String)> {
    let config_path = std::env::var("MCPOOL_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = mp_domain::config::Config::load(&config_path)
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_flag() {
        assert_eq!(
            parse_header("Authorization: Bearer abc").unwrap(),
            ("Authorization".to_string(), "Bearer abc".to_string())
        );
        // Only the first colon separates name from value.
        assert_eq!(parse_header("X-Url:http://a").unwrap().1, "http://a");
    }

    #[test]
    fn rejects_malformed_header_flag() {
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn parses_call_command() {
        let cli = Cli::try_parse_from([
            "mcpool",
            "call",
            "--server",
            "remote",
            "--tool",
            "echo",
            "--args",
            r#"{"text":"hi"}"#,
            "-H",
            "Authorization: Bearer a",
            "-H",
            "Authorization: Bearer b",
        ])
        .unwrap();

        match cli.command {
            Command::Call { target, tool, args, json } => {
                assert_eq!(target.server, "remote");
                assert_eq!(tool, "echo");
                assert_eq!(args, r#"{"text":"hi"}"#);
                assert!(!json);
                assert_eq!(target.header_map()["Authorization"], "Bearer b");
                assert_eq!(target.timeout_secs, 30);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["mcpool", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Validate)));
    }
}
