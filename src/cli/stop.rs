//! `bannerbot stop`

use anyhow::{Context, Result};

use bannerbot_core::{stop_instance, Database};

use crate::bot::{loader::load_config, logging};

pub async fn run(instance_id: i64) -> Result<()> {
    let config = load_config()?;
    logging::init_terminal(&config.logging)?;

    let database = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;

    let report = stop_instance(&database, instance_id)
        .await
        .with_context(|| format!("Failed to stop the bot for instance {}", instance_id))?;

    if report.signalled.is_empty() && report.pruned.is_empty() {
        println!("No bot is registered for instance {}.", instance_id);
        return Ok(());
    }

    for pid in &report.signalled {
        println!("Sent SIGTERM to PID {}.", pid);
    }
    for record in &report.pruned {
        println!(
            "Removed the stale record of PID {} (process is gone).",
            record.process_id
        );
    }
    Ok(())
}
