//! Shared start-up for the command-line tools.

use hiverag_core::config::{Config, RagSettings};
use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

pub fn load_settings() -> anyhow::Result<RagSettings> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    Ok(config.settings()?)
}
