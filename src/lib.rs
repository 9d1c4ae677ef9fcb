//! logreplay Library
//!
//! Replays a scripted sequence of security events (CEF, Cisco ASA or plain
//! text) to a syslog receiver, pacing each line by its own delay and tagging
//! framed events before handing them to the forwarder.

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod forwarder;
pub mod logging;
pub mod record;

pub use classifier::{classify, ClassifiedMessage, Framing};
pub use config::Config;
pub use dispatcher::{Dispatcher, LineOutcome, ReplaySummary};
pub use forwarder::{DryRunForwarder, ForwardError, Forwarder, LoggerForwarder};
pub use record::{parse_record, Destination, ParseError, ParsedRecord};
