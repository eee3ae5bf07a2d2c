use crate::models::LoggingSettings;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup logging with a rotating file appender and optional console output.
///
/// Logs are written to `settings.dir` with daily rotation, one file per day
/// named after `settings.prefix`. `RUST_LOG` overrides the level chosen by
/// `settings.debug`.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(settings: &LoggingSettings) -> Result<WorkerGuard> {
    let log_path = ensure_log_dir(&settings.dir)?;

    let file_appender = rolling::daily(&log_path, &settings.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Readings go to stdout, so the console layer writes to stderr
    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter(settings.debug))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_path,
        settings.prefix,
        settings.debug,
        settings.console
    );

    Ok(guard)
}

fn env_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Create the log directory if it doesn't exist
fn ensure_log_dir(dir: &str) -> Result<Utf8PathBuf> {
    let log_path = Utf8PathBuf::from(dir);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_path))?;
    }
    Ok(log_path)
}
