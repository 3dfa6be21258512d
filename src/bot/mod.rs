//! Process-level plumbing for the bot binary: configuration and logging

pub mod config;
pub mod loader;
pub mod logging;
