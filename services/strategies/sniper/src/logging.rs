//! Subscriber installation for the binary

use anyhow::{Context, Result};
use config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` when set, otherwise the configured level.
pub fn filter(cfg: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("Invalid logging.level {:?}", cfg.level)),
    }
}

pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(cfg)?);
    if cfg.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
    .context("Failed to install tracing subscriber")
}
