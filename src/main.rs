use clap::Parser;
use poly_tail::cli::{Cli, Commands};
use poly_tail::config::{Config, ConfigError};

/// Built-in configuration used when no config file exists
const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing file falls back to the example; an invalid one is fatal
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::from_toml(DEFAULT_CONFIG)?
        }
        Err(e) => return Err(e.into()),
    };

    poly_tail::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(markets = config.markets.len(), "Starting paper trading mode");
            args.execute(config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config.state.path).await?;
        }
        Commands::Config => {
            println!("Current configuration ({}):", cli.config);
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
