//! Forwarders for sending classified messages to a syslog receiver
//!
//! The replay loop only knows the [`Forwarder`] trait. The default
//! implementation hands each message to `logger(1)`; the dry-run variant
//! logs the invocation it would have made.

use crate::classifier::ClassifiedMessage;
use crate::config::{ForwarderConfig, Transport};
use crate::record::Destination;
use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to run forwarder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("forwarder '{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Delivers one message to one destination
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        destination: &Destination,
        message: &ClassifiedMessage,
    ) -> Result<(), ForwardError>;
}

#[async_trait]
impl<F: Forwarder + ?Sized> Forwarder for Box<F> {
    async fn forward(
        &self,
        destination: &Destination,
        message: &ClassifiedMessage,
    ) -> Result<(), ForwardError> {
        (**self).forward(destination, message).await
    }
}

/// Forwards through the `logger` command line tool
#[derive(Debug, Clone)]
pub struct LoggerForwarder {
    program: String,
    priority: String,
    transport: Transport,
}

impl LoggerForwarder {
    pub fn new(config: &ForwarderConfig) -> Self {
        Self {
            program: config.program.clone(),
            priority: config.priority.clone(),
            transport: config.transport,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the `logger` argument list for one message
    ///
    /// `-t` is only passed when the message carries a tag.
    pub fn build_args(&self, destination: &Destination, message: &ClassifiedMessage) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.priority.clone()];

        if message.has_tag() {
            args.push("-t".to_string());
            args.push(message.tag.clone());
        }

        args.push(message.body.clone());
        args.push("-P".to_string());
        args.push(destination.port.to_string());
        args.push(self.transport.logger_flag().to_string());
        args.push("-n".to_string());
        args.push(destination.ip.to_string());

        args
    }
}

#[async_trait]
impl Forwarder for LoggerForwarder {
    async fn forward(
        &self,
        destination: &Destination,
        message: &ClassifiedMessage,
    ) -> Result<(), ForwardError> {
        let args = self.build_args(destination, message);
        debug!("Invoking {} with {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ForwardError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ForwardError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Logs the `logger` invocation instead of running it
#[derive(Debug, Clone)]
pub struct DryRunForwarder {
    logger: LoggerForwarder,
}

impl DryRunForwarder {
    pub fn new(config: &ForwarderConfig) -> Self {
        Self {
            logger: LoggerForwarder::new(config),
        }
    }
}

#[async_trait]
impl Forwarder for DryRunForwarder {
    async fn forward(
        &self,
        destination: &Destination,
        message: &ClassifiedMessage,
    ) -> Result<(), ForwardError> {
        let args = self.logger.build_args(destination, message);
        info!("Dry run, would invoke: {} {}", self.logger.program(), args.join(" "));
        Ok(())
    }
}
