use anyhow::Result;
use clap::Parser;
use realtime_session::cli::{self, Cli, Commands, ConfigCommand, ConnectOptions};
use realtime_session::SessionConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Connect {
            url,
            token,
            buffer_size,
            config,
            name,
            message,
            once,
        } => {
            let options = ConnectOptions {
                url,
                token,
                buffer_size,
                config,
                name,
                messages: message,
                once,
            };
            if let Err(e) = cli::run_connect(options).await {
                error!("{:#}", e);
                return Err(e);
            }
        }
        Commands::Config { command } => match command {
            ConfigCommand::Path => match SessionConfig::default_config_file() {
                Ok(path) => println!("{}", path.display()),
                Err(e) => error!("Failed to determine configuration path: {}", e),
            },
            ConfigCommand::Show { config, json } => cli::show_config(config.as_deref(), json)?,
            ConfigCommand::Init { endpoint, force } => {
                let path = cli::init_config(endpoint, force)?;
                info!("Configuration written to {}", path.display());
            }
        },
    }

    Ok(())
}
