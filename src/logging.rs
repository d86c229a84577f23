//! Logging setup
//!
//! Installs a global `tracing` subscriber from a [`LoggingConfig`]:
//! console output (plain or JSON) filtered by `RUST_LOG` or the configured
//! level, plus an optional daily-rolling file.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "hookwire.log";

/// Initialize the global subscriber
///
/// Returns the file writer guard when a log directory is configured; keep it
/// alive for as long as logs should be flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console = if config.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging initialized (level: {}, json: {})", config.level, config.json);

    Ok(guard)
}
