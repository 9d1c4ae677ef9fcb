//! logreplay - Main Application Entry Point
//!
//! Replays a script of delayed security events to a syslog receiver.

use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use logreplay::{logging::initialise_logging, Config, Dispatcher, DryRunForwarder, Forwarder, LoggerForwarder};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("logreplay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replays scripted CEF, Cisco ASA and plain security events to a syslog receiver.\n\nScript lines look like <delay_seconds>|<message>|<ip>:<port>; lines starting with '#' are ignored.")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Replay script to send (defaults to replay.input from the configuration)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("logreplay.json"),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Log the forwarder invocations instead of running them")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress console output")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a default configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .context("Missing configuration path")?;
    let dry_run = matches.get_flag("dry-run");
    let quiet = matches.get_flag("quiet");

    if matches.get_flag("generate-config") {
        return generate_default_config(&config_path).await;
    }

    let (config, loaded) = load_configuration(&config_path).await?;

    initialise_logging(&config.logging, quiet)?;

    info!("Starting logreplay v{}", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Configuration loaded from: {}", config_path.display());
    } else {
        warn!("Configuration file not found: {} - using defaults", config_path.display());
    }

    config.validate().context("Configuration validation failed")?;

    let input = matches
        .get_one::<String>("input")
        .cloned()
        .unwrap_or_else(|| config.replay.input.clone());

    let forwarder: Box<dyn Forwarder> = if dry_run {
        info!("Dry run enabled, no messages will be sent");
        Box::new(DryRunForwarder::new(&config.forwarder))
    } else {
        Box::new(LoggerForwarder::new(&config.forwarder))
    };

    let summary = Dispatcher::new(forwarder).replay_file(&input).await?;

    if summary.failed > 0 {
        warn!("{} message(s) could not be forwarded", summary.failed);
    }

    Ok(())
}

/// Generate a default configuration file
async fn generate_default_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    Config::default()
        .save_to_file(config_path)
        .await
        .context("Failed to save default configuration")?;

    println!("Default configuration generated: {}", config_path.display());
    Ok(())
}

/// Load configuration from file, falling back to defaults when it is missing
async fn load_configuration(config_path: &Path) -> Result<(Config, bool)> {
    if !config_path.exists() {
        return Ok((Config::default(), false));
    }

    let config = Config::load_from_file(config_path)
        .await
        .context("Failed to load configuration file")?;
    Ok((config, true))
}
