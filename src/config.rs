//! Configuration management for logreplay
//!
//! Loads and saves the JSON configuration file and validates the forwarder,
//! replay and logging sections before a run starts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Syslog facility names accepted by `logger -p`
const FACILITIES: &[&str] = &[
    "auth", "authpriv", "cron", "daemon", "ftp", "kern", "lpr", "mail", "news", "security",
    "syslog", "user", "uucp", "local0", "local1", "local2", "local3", "local4", "local5",
    "local6", "local7",
];

/// Syslog severity names accepted by `logger -p`
const SEVERITIES: &[&str] = &[
    "emerg", "panic", "alert", "crit", "err", "error", "warn", "warning", "notice", "info",
    "debug",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const ROTATION_STRATEGIES: &[&str] = &["daily", "hourly", "never"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forwarder: ForwarderConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport the forwarder is told to use when talking to the receiver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Connection-oriented delivery (`logger -T`)
    #[default]
    Tcp,
    /// Datagram delivery (`logger -d`)
    Udp,
}

impl Transport {
    /// The `logger` flag selecting this transport
    pub fn logger_flag(&self) -> &'static str {
        match self {
            Self::Tcp => "-T",
            Self::Udp => "-d",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_input")]
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_console_output")]
    pub console_output: bool,
    #[serde(default)]
    pub file_output: Option<String>,
    #[serde(default = "default_rotation_strategy")]
    pub rotation_strategy: String,
}

fn default_program() -> String { "logger".to_string() }
fn default_priority() -> String { "local4.warn".to_string() }
fn default_input() -> String { "example/4_lines_example.txt".to_string() }
fn default_level() -> String { "info".to_string() }
fn default_console_output() -> bool { true }
fn default_rotation_strategy() -> String { "daily".to_string() }

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            priority: default_priority(),
            transport: Transport::default(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { input: default_input() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_output: default_console_output(),
            file_output: None,
            rotation_strategy: default_rotation_strategy(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .context("Failed to read configuration file")?;

        let config: Config = serde_json::from_str(&content)
            .context("Failed to parse configuration JSON")?;

        debug!("Parsed configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialise configuration")?;

        tokio::fs::write(path.as_ref(), content)
            .await
            .context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // 1. Forwarder validation
        if self.forwarder.program.trim().is_empty() {
            anyhow::bail!("Forwarder program cannot be empty");
        }
        validate_priority(&self.forwarder.priority)
            .with_context(|| format!("Invalid forwarder priority: '{}'", self.forwarder.priority))?;

        // 2. Replay validation
        if self.replay.input.trim().is_empty() {
            anyhow::bail!("Replay input path cannot be empty");
        }

        // 3. Logging validation
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Unknown log level: '{}'", self.logging.level);
        }
        if !ROTATION_STRATEGIES.contains(&self.logging.rotation_strategy.as_str()) {
            anyhow::bail!("Unknown log rotation strategy: '{}'", self.logging.rotation_strategy);
        }
        if let Some(ref file) = self.logging.file_output {
            if file.trim().is_empty() {
                anyhow::bail!("Log file path cannot be empty when file output is set");
            }
        }

        Ok(())
    }
}

/// Check a `facility.severity` pair against the names `logger` understands
fn validate_priority(priority: &str) -> Result<()> {
    let (facility, severity) = priority
        .split_once('.')
        .context("Priority must be in the form facility.severity")?;

    if !FACILITIES.contains(&facility) {
        anyhow::bail!("Unknown syslog facility: '{}'", facility);
    }
    if !SEVERITIES.contains(&severity) {
        anyhow::bail!("Unknown syslog severity: '{}'", severity);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forwarder.program, "logger");
        assert_eq!(config.forwarder.priority, "local4.warn");
        assert_eq!(config.forwarder.transport, Transport::Tcp);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"forwarder": {"transport": "udp"}}"#).unwrap();
        assert_eq!(config.forwarder.transport, Transport::Udp);
        assert_eq!(config.forwarder.program, "logger");
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.console_output);
    }

    #[test]
    fn transport_flags() {
        assert_eq!(Transport::Tcp.logger_flag(), "-T");
        assert_eq!(Transport::Udp.logger_flag(), "-d");
    }

    #[test]
    fn rejects_bad_priority() {
        let mut config = Config::default();
        config.forwarder.priority = "local4".to_string();
        assert!(config.validate().is_err());

        config.forwarder.priority = "local9.warn".to_string();
        assert!(config.validate().is_err());

        config.forwarder.priority = "local4.loud".to_string();
        assert!(config.validate().is_err());

        config.forwarder.priority = "auth.notice".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_program_and_unknown_logging() {
        let mut config = Config::default();
        config.forwarder.program = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.rotation_strategy = "size".to_string();
        assert!(config.validate().is_err());
    }
}
