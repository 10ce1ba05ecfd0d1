//! Tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "CLAUDE_STATS_LOG";

/// Installs the global subscriber: stderr always, plus an appended log file when given.
///
/// `default_level` applies when `CLAUDE_STATS_LOG` is unset or invalid.
pub fn init_logging(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(Arc::new(file));
            registry
                .with(file_layer)
                .try_init()
                .context("Failed to install tracing subscriber")
        }
        None => registry
            .try_init()
            .context("Failed to install tracing subscriber"),
    }
}
