use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionguard::cli::{self, Cli, Commands, ConfigCommands};
use sessionguard::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Watch {
            token,
            print_metrics,
        } => {
            tracing::info!("Starting sessionguard v{}", env!("CARGO_PKG_VERSION"));
            cli::run_watch(config, token, print_metrics).await
        }
        Commands::Inspect { token } => cli::run_inspect(&token),
        Commands::Config(ConfigCommands::Check) => cli::run_config_check(&cli.config),
    }
}
