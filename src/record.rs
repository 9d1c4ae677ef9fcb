//! Record parsing for replay scripts
//!
//! Each script line has the shape `<delay>|<payload>|<ip>:<port>`. The
//! payload may itself contain `|`, so everything strictly between the first
//! and the last separator belongs to it.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

const FIELD_SEPARATOR: char = '|';
const COMMENT_PREFIX: char = '#';

/// Reasons a script line cannot be replayed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer `|`-separated fields than the step needs
    #[error("line is not in the required format <delay>|<message>|<ip>:<port>. Line: {line}")]
    MalformedLine { line: String },

    /// Delay field is not a finite number
    #[error("delay '{value}' is not a number")]
    NotANumber { value: String },

    /// Delay field is a number below zero
    #[error("delay '{value}' must not be negative")]
    NegativeDelay { value: String },

    /// Delay field is too large to wait for
    #[error("delay '{value}' is out of range")]
    DelayOutOfRange { value: String },

    /// Destination field is not `ip:port`
    #[error("destination should be in the format ip:port. Got: {value}")]
    MalformedDestination { value: String },

    #[error("destination ip is not valid. Got: {value}")]
    InvalidIp { value: String },

    #[error("destination port is not valid. Got: {value}")]
    InvalidPort { value: String },
}

/// Receiver address taken from the last field of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub ip: IpAddr,
    pub port: u16,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// A fully validated script line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub delay: Duration,
    pub payload: String,
    pub destination: Destination,
}

/// Comment lines are skipped before any field is looked at
pub fn is_comment(line: &str) -> bool {
    line.starts_with(COMMENT_PREFIX)
}

/// Parse a whole line, stopping at the first field that fails validation
pub fn parse_record(line: &str) -> Result<ParsedRecord, ParseError> {
    let delay = extract_delay(line)?;
    let payload = extract_payload(line)?;
    let destination = extract_destination(line)?;

    Ok(ParsedRecord {
        delay,
        payload,
        destination,
    })
}

/// Read the leading delay, in seconds
pub fn extract_delay(line: &str) -> Result<Duration, ParseError> {
    let tokens: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if tokens.len() < 2 {
        return Err(ParseError::MalformedLine {
            line: line.to_string(),
        });
    }

    let raw = tokens[0];
    let seconds: f64 = raw.parse().map_err(|_| ParseError::NotANumber {
        value: raw.to_string(),
    })?;

    if !seconds.is_finite() {
        return Err(ParseError::NotANumber {
            value: raw.to_string(),
        });
    }
    if seconds < 0.0 {
        return Err(ParseError::NegativeDelay {
            value: raw.to_string(),
        });
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| ParseError::DelayOutOfRange {
        value: raw.to_string(),
    })
}

/// Join every field between the first and the last back into one payload
pub fn extract_payload(line: &str) -> Result<String, ParseError> {
    let tokens: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if tokens.len() < 3 {
        return Err(ParseError::MalformedLine {
            line: line.to_string(),
        });
    }

    Ok(tokens[1..tokens.len() - 1].join("|"))
}

/// Validate the trailing `ip:port` field
///
/// A bare IPv6 literal contains colons of its own, so it is only accepted in
/// the bracketed `[addr]:port` form.
pub fn extract_destination(line: &str) -> Result<Destination, ParseError> {
    // split() always yields at least one item
    let field = line.rsplit(FIELD_SEPARATOR).next().unwrap_or(line);

    let (ip_part, port_part) = split_host_port(field).ok_or_else(|| {
        ParseError::MalformedDestination {
            value: field.to_string(),
        }
    })?;

    let ip: IpAddr = ip_part
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidIp {
            value: ip_part.to_string(),
        })?;

    let port: u16 = port_part.parse().map_err(|_| ParseError::InvalidPort {
        value: port_part.to_string(),
    })?;

    Ok(Destination { ip, port })
}

fn split_host_port(field: &str) -> Option<(&str, &str)> {
    let trimmed = field.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some((host, port));
    }

    let parts: Vec<&str> = field.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parts[0], parts[1]))
}
