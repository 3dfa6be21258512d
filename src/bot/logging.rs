//! Log output setup
//!
//! Interactive runs log to the terminal. `--background` runs write a daily
//! rolling file per instance; the returned guard flushes it on drop and must
//! live until the process exits.

use super::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name for one instance (the appender adds a date suffix)
pub fn log_file_name(instance_id: i64) -> String {
    format!("bannerbot-instance-{}.log", instance_id)
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .with_context(|| format!("Invalid log filter `{}`", config.filter)),
    }
}

/// Log to the terminal
pub fn init_terminal(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install the log subscriber")
}

/// Log to the instance's rolling file
pub fn init_background(config: &LoggingConfig, instance_id: i64) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "Failed to create log directory {}",
            config.directory.display()
        )
    })?;

    let appender =
        tracing_appender::rolling::daily(&config.directory, log_file_name(instance_id));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name(3), "bannerbot-instance-3.log");
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig {
            filter: "bannerbot=loud[".to_string(),
            ..LoggingConfig::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter(&config).is_err());
        }
    }
}
