//! Bannerbot - per-instance TeamSpeak banner bot
//!
//! CLI entry point. `bannerbot start <id>` runs the bot in the foreground
//! until SIGINT/SIGTERM; `stop` and `status` manage running bots through the
//! process registry.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;

mod bot;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    cli::run(cli).await
}
