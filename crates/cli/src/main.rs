use clap::Parser;
use tracing_subscriber::EnvFilter;

use mp_cli::cli::{self, Cli, Command, ConfigCommand};
use mp_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = Cli::parse();
    let (config, config_path) = cli::load_config()?;
    init_tracing(&config.observability);

    match parsed.command {
        Command::Probe(target) => cli::session::probe(&config, target).await,
        Command::Tools(target) => cli::session::tools(&config, target).await,
        Command::Call { target, tool, args, json } => cli::session::call(&config, target, tool, args, json).await,
        Command::Config(ConfigCommand::Validate) => {
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => cli::config::show(&config),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
///
/// Logs go to stderr so command output on stdout stays pipeable.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if obs.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
