//! `bannerbot start`

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use bannerbot_core::{
    install_signal_listener, Collaborators, Database, LifecycleController, LifecycleOptions,
    RedisCache, ServerQueryProvider, ServerQueryViews, TerminationSignal,
};

use crate::bot::{loader::load_config, logging};

/// Command line stored in the process record
pub fn command_line(instance_id: i64, background: bool) -> String {
    let mut command = format!("bannerbot start {}", instance_id);
    if background {
        command.push_str(" --background");
    }
    command
}

/// End the signal listener, which is still waiting when the bot stopped on
/// its own
async fn stop_listener(
    shutdown: &CancellationToken,
    listener: JoinHandle<Option<TerminationSignal>>,
) -> Option<TerminationSignal> {
    shutdown.cancel();
    match listener.await {
        Ok(signal) => signal,
        Err(e) => {
            debug!(error = %e, "Signal listener ended abnormally");
            None
        }
    }
}

pub async fn run(instance_id: i64, background: bool) -> Result<()> {
    let config = load_config()?;

    // Flushes the log file on exit
    let _guard = if background {
        Some(logging::init_background(&config.logging, instance_id)?)
    } else {
        logging::init_terminal(&config.logging)?;
        None
    };

    info!("Starting bannerbot v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let listener =
        install_signal_listener(shutdown.clone()).context("Failed to install signal handlers")?;
    info!("Signal handlers installed.");

    let database = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    let cache = RedisCache::new(&config.redis.url, config.redis.timeout())
        .context("Invalid Redis configuration")?;

    let controller = LifecycleController::new(
        Collaborators {
            instances: Arc::new(database.clone()),
            sessions: Arc::new(ServerQueryProvider::new(config.session.settings())),
            views: Arc::new(ServerQueryViews::new()),
            cache: Arc::new(cache),
            registry: Arc::new(database),
        },
        LifecycleOptions {
            quit_timeout: config.session.quit_timeout(),
        },
    );

    let outcome = controller
        .run(
            instance_id,
            &command_line(instance_id, background),
            shutdown.clone(),
        )
        .await;

    stop_listener(&shutdown, listener).await;

    if let Err(e) = &outcome {
        if e.is_startup_failure() {
            error!("{}", e);
        }
    }
    outcome.with_context(|| format!("Bot for instance {} failed", instance_id))
}
