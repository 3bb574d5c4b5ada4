//! Logging initialization.
//!
//! Diagnostics go to stderr so that stdout only carries the stage reports.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the filter from an explicit level, else `RUST_LOG`, else `info`.
pub fn filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match level {
        Some(level) => Ok(EnvFilter::try_new(level)?),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))),
    }
}

pub fn init(level: Option<&str>) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(filter(level)?)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}
