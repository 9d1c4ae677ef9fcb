//! Logging setup for logreplay
//!
//! Console output on stdout, an optional rolling log file, and a stderr
//! fallback when both are switched off.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

// Keeps the non-blocking file writer alive for the whole process
static GUARD_HOLDER: OnceLock<WorkerGuard> = OnceLock::new();

/// Map a configured level name onto a tracing level, defaulting to INFO
pub fn parse_level(level: &str) -> tracing::Level {
    match level {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Install the global subscriber
pub fn initialise_logging(config: &LoggingConfig, quiet: bool) -> Result<()> {
    let level = parse_level(&config.level);
    let mut layers = Vec::new();

    if config.console_output && !quiet {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);
        layers.push(console_layer.boxed());
    }

    if let Some(log_file_path) = config.logging_file() {
        let log_path = Path::new(log_file_path);
        let log_dir = log_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let log_filename = log_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("logreplay.log");

        std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;

        let file_appender = match config.rotation_strategy.as_str() {
            "hourly" => tracing_appender::rolling::hourly(log_dir, log_filename),
            "never" => tracing_appender::rolling::never(log_dir, log_filename),
            _ => tracing_appender::rolling::daily(log_dir, log_filename),
        };

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        layers.push(file_layer.boxed());

        let _ = GUARD_HOLDER.set(guard);
    }

    if layers.is_empty() {
        let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        layers.push(stderr_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .try_init()
        .context("Failed to install logging subscriber")?;

    Ok(())
}

impl LoggingConfig {
    /// The configured log file, ignoring empty paths
    fn logging_file(&self) -> Option<&str> {
        self.file_output
            .as_deref()
            .filter(|path| !path.trim().is_empty())
    }
}
