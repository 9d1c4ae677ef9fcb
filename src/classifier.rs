//! Message classification
//!
//! Payloads carrying CEF or Cisco ASA framing are split into a syslog tag and
//! a body; anything else is forwarded untagged.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

const ASA_PREFIX: &str = "%ASA-";

/// Matches an ASA header at the start of the payload or a CEF header anywhere
static FRAMING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%ASA-|CEF:").expect("framing pattern is a valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Common Event Format, `CEF:` somewhere in the payload
    Cef,
    /// Cisco ASA, payload starts with `%ASA-`
    Asa,
    Unframed,
}

impl Framing {
    /// Detect the framing of a payload
    pub fn detect(payload: &str) -> Self {
        match FRAMING_PATTERN.find(payload) {
            Some(m) if m.as_str() == ASA_PREFIX => Self::Asa,
            Some(_) => Self::Cef,
            None => Self::Unframed,
        }
    }

    pub fn is_framed(&self) -> bool {
        !matches!(self, Self::Unframed)
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cef => write!(f, "cef"),
            Self::Asa => write!(f, "asa"),
            Self::Unframed => write!(f, "plain"),
        }
    }
}

/// Tag and quoted body handed to the forwarder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMessage {
    pub framing: Framing,
    /// Empty for unframed payloads
    pub tag: String,
    /// Always wrapped in double quotes
    pub body: String,
}

impl ClassifiedMessage {
    pub fn has_tag(&self) -> bool {
        !self.tag.is_empty()
    }
}

/// Classify a payload into tag and body.
///
/// Framed payloads are split at the first `:`. Everything after it, inner
/// colons included, stays in the body, so `CEF:0|...|msg=a:b` keeps `a:b`.
pub fn classify(payload: &str) -> ClassifiedMessage {
    let framing = Framing::detect(payload);

    let (tag, body) = if framing.is_framed() {
        // framed payloads always contain a ':' (the CEF header or the ASA
        // message id separator); a bare "%ASA-" prefix has an empty body
        match payload.split_once(':') {
            Some((tag, rest)) => (tag, rest),
            None => (payload, ""),
        }
    } else {
        ("", payload)
    };

    ClassifiedMessage {
        framing,
        tag: tag.to_string(),
        body: quote(body),
    }
}

fn quote(body: &str) -> String {
    format!("\"{}\"", body)
}
