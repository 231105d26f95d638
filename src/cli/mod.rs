//! CLI interface for poly-tail
//!
//! Provides subcommands for:
//! - `run`: Start the tick and take-profit schedulers
//! - `status`: Show the persisted order ledger
//! - `config`: Show the effective configuration

mod run;
pub mod status;

pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-tail")]
#[command(about = "Tail convergence trading bot for Polymarket hourly up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start trading (paper execution)
    Run(RunArgs),
    /// Show the persisted order ledger
    Status(StatusArgs),
    /// Show the effective configuration
    Config,
}
