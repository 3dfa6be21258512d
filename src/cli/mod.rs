//! CLI module for Bannerbot
//!
//! - `start`: run the bot for one instance
//! - `stop`: stop the bots registered for an instance
//! - `status`: list registered bots

use clap::{Parser, Subcommand};

pub mod start;
pub mod status;
pub mod stop;

/// TeamSpeak banner bot
#[derive(Parser, Debug)]
#[command(name = "bannerbot")]
#[command(about = "Keeps the banner caches of a TeamSpeak instance fresh")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot for an instance until interrupted
    Start {
        /// Instance ID
        instance_id: i64,
        /// Log to a daily rolling file instead of the terminal
        #[arg(long)]
        background: bool,
    },
    /// Stop the bots running for an instance
    Stop {
        /// Instance ID
        instance_id: i64,
    },
    /// List registered bot processes
    Status {
        /// Only show this instance
        instance_id: Option<i64>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Start {
            instance_id,
            background,
        } => start::run(instance_id, background).await,
        Commands::Stop { instance_id } => stop::run(instance_id).await,
        Commands::Status { instance_id } => status::run(instance_id).await,
    }
}
