//! `bannerbot status`

use anyhow::{Context, Result};

use bannerbot_core::{is_process_alive, Database, ProcessRecord, ProcessRegistry};

use crate::bot::{loader::load_config, logging};

fn format_row(record: &ProcessRecord, alive: bool) -> String {
    format!(
        "{:<8} {:<8} {:<8} {:<6} {:<20} {}",
        record.instance_id,
        record.process_id,
        record.id,
        if alive { "yes" } else { "no" },
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.command
    )
}

pub async fn run(instance_id: Option<i64>) -> Result<()> {
    let config = load_config()?;
    logging::init_terminal(&config.logging)?;

    let database = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;

    let records = match instance_id {
        Some(id) => database.list_for_instance(id).await,
        None => database.list_all().await,
    }
    .context("Failed to read process records")?;

    if records.is_empty() {
        println!("No bots are registered.");
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<8} {:<6} {:<20} {}",
        "INSTANCE", "PID", "RECORD", "ALIVE", "STARTED (UTC)", "COMMAND"
    );
    for record in &records {
        println!("{}", format_row(record, is_process_alive(record.process_id)));
    }
    Ok(())
}
