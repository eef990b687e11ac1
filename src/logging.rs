use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize daily-rolling file logging under `<data_dir>/logs`.
/// The returned guard must stay alive for the process lifetime or buffered
/// log lines are dropped on exit.
pub fn init_logging(data_dir: &str) -> Result<WorkerGuard> {
    let log_dir = PathBuf::from(data_dir).join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "grocerai.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(guard)
}

/// Console logging for dev and one-shot CLI commands.
pub fn init_console_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();
}
