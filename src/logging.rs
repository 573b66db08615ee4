use anyhow::{Context, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_FILE_NAME: &str = "mctools.log";

/// `RUST_LOG` if set, else `mctools=info` (`mctools=debug` when verbose).
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "mctools=debug" } else { "mctools=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber: everything the filter allows goes to
/// `<log_dir>/mctools.log`, warnings and errors also go to stderr (all
/// levels when verbose).
///
/// The returned guard flushes the file writer on drop; hold it for the
/// life of the process.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let stderr_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(stderr_level),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(dir = %log_dir.display(), "Logging initialized");
    Ok(guard)
}
