//! Replay dispatcher
//!
//! Drives every script line through parse, classify, wait and forward. Lines
//! are handled strictly one after another; the delay of a line is awaited
//! before its message is forwarded and before the next line is read.

use crate::classifier::classify;
use crate::forwarder::Forwarder;
use crate::record::{is_comment, parse_record, ParseError, ParsedRecord};
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// What happened to a single script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Starts with `#`, nothing was parsed
    Comment,
    Skipped(ParseError),
    Forwarded,
    /// The forwarder reported an error; the run carries on
    ForwardFailed(String),
}

/// Counters for one replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: u64,
    pub comments: u64,
    pub skipped: u64,
    pub forwarded: u64,
    pub failed: u64,
}

impl ReplaySummary {
    fn record(&mut self, outcome: &LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Comment => self.comments += 1,
            LineOutcome::Skipped(_) => self.skipped += 1,
            LineOutcome::Forwarded => self.forwarded += 1,
            LineOutcome::ForwardFailed(_) => self.failed += 1,
        }
    }
}

pub struct Dispatcher<F: Forwarder> {
    forwarder: F,
}

/// Drop the trailing `\n` or `\r\n` left by `read_until`
fn strip_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

impl<F: Forwarder> Dispatcher<F> {
    pub fn new(forwarder: F) -> Self {
        Self { forwarder }
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Process one script line to completion
    pub async fn process_line(&self, line: &str) -> LineOutcome {
        if is_comment(line) {
            debug!("Skipping comment line: {}", line);
            return LineOutcome::Comment;
        }

        match parse_record(line) {
            Ok(record) => self.dispatch(record).await,
            Err(e) => {
                warn!("Skipping line: {}. Line: {}", e, line);
                LineOutcome::Skipped(e)
            }
        }
    }

    /// Classify, wait out the delay, then forward
    pub async fn dispatch(&self, record: ParsedRecord) -> LineOutcome {
        let message = classify(&record.payload);
        debug!(
            "Classified payload as {} (tag: '{}'), waiting {:?} before sending to {}",
            message.framing, message.tag, record.delay, record.destination
        );

        tokio::time::sleep(record.delay).await;

        match self.forwarder.forward(&record.destination, &message).await {
            Ok(()) => {
                info!("Message was sent to {} - {}", record.destination, record.payload);
                LineOutcome::Forwarded
            }
            Err(e) => {
                error!("Could not send message to {}: {}", record.destination, e);
                LineOutcome::ForwardFailed(e.to_string())
            }
        }
    }

    /// Replay an in-memory script
    pub async fn replay<I, S>(&self, lines: I) -> ReplaySummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = ReplaySummary::default();
        for line in lines {
            let outcome = self.process_line(line.as_ref()).await;
            summary.record(&outcome);
        }
        summary
    }

    /// Replay a script file line by line
    ///
    /// Only opening the file can fail the run. Lines that are not valid
    /// UTF-8 are decoded lossily, and a read error ends the replay early
    /// with the lines sent so far.
    pub async fn replay_file<P: AsRef<Path>>(&self, path: P) -> Result<ReplaySummary> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open replay script {}", path.display()))?;

        info!("Replaying {}", path.display());

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_number = 0u64;
        let mut summary = ReplaySummary::default();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(
                        "Failed to read replay script {} after line {}: {}",
                        path.display(),
                        line_number,
                        e
                    );
                    break;
                }
            }
            line_number += 1;

            let raw = strip_line_ending(&buf);
            let line = String::from_utf8_lossy(raw);
            if let Cow::Owned(_) = line {
                warn!("Line {} is not valid UTF-8, replacing invalid bytes", line_number);
            }

            let outcome = self.process_line(&line).await;
            summary.record(&outcome);
        }

        info!(
            "Replay finished: {} line(s), {} forwarded, {} skipped, {} failed, {} comment(s)",
            summary.lines, summary.forwarded, summary.skipped, summary.failed, summary.comments
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifiedMessage;
    use crate::forwarder::ForwardError;
    use crate::record::Destination;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Records every call together with the (paused) clock reading
    struct RecordingForwarder {
        start: Instant,
        fail: bool,
        calls: Mutex<Vec<(Duration, String, String, String)>>,
    }

    impl RecordingForwarder {
        fn new(fail: bool) -> Self {
            Self {
                start: Instant::now(),
                fail,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(Duration, String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Forwarder for RecordingForwarder {
        async fn forward(
            &self,
            destination: &Destination,
            message: &ClassifiedMessage,
        ) -> Result<(), ForwardError> {
            self.calls.lock().unwrap().push((
                self.start.elapsed(),
                destination.to_string(),
                message.tag.clone(),
                message.body.clone(),
            ));
            if self.fail {
                return Err(ForwardError::Exit {
                    program: "logger".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "connection refused".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn line_endings_are_stripped() {
        assert_eq!(strip_line_ending(b"0|a|1.2.3.4:514\n"), b"0|a|1.2.3.4:514");
        assert_eq!(strip_line_ending(b"0|a|1.2.3.4:514\r\n"), b"0|a|1.2.3.4:514");
        assert_eq!(strip_line_ending(b"0|a|1.2.3.4:514"), b"0|a|1.2.3.4:514");
        assert_eq!(strip_line_ending(b"\n"), b"");
    }

    #[tokio::test(start_paused = true)]
    async fn cef_line_end_to_end() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(false));
        let outcome = dispatcher
            .process_line("0.5|CEF:0|Vendor|Product|1.0|100|Event|3|src=10.0.0.1|10.0.0.2:514")
            .await;
        assert_eq!(outcome, LineOutcome::Forwarded);

        let calls = dispatcher.forwarder().calls();
        assert_eq!(calls.len(), 1);
        let (at, destination, tag, body) = &calls[0];
        assert!(*at >= Duration::from_millis(500));
        assert_eq!(destination, "10.0.0.2:514");
        assert_eq!(tag, "CEF");
        assert_eq!(body, "\"0|Vendor|Product|1.0|100|Event|3|src=10.0.0.1\"");
    }

    #[tokio::test(start_paused = true)]
    async fn plain_line_end_to_end() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(false));
        let outcome = dispatcher
            .process_line("1|plain text message|192.168.1.1:9000")
            .await;
        assert_eq!(outcome, LineOutcome::Forwarded);

        let calls = dispatcher.forwarder().calls();
        let (at, destination, tag, body) = &calls[0];
        assert!(*at >= Duration::from_secs(1));
        assert_eq!(destination, "192.168.1.1:9000");
        assert_eq!(tag, "");
        assert_eq!(body, "\"plain text message\"");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_lines_never_forward() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(false));

        assert!(matches!(
            dispatcher.process_line("1|10.0.0.1:514").await,
            LineOutcome::Skipped(ParseError::MalformedLine { .. })
        ));
        assert!(matches!(
            dispatcher.process_line("1|msg|999.999.999.999:514").await,
            LineOutcome::Skipped(ParseError::InvalidIp { .. })
        ));
        assert!(matches!(
            dispatcher.process_line("1|msg|10.0.0.1:abc").await,
            LineOutcome::Skipped(ParseError::InvalidPort { .. })
        ));
        assert!(matches!(
            dispatcher.process_line("soon|msg|10.0.0.1:514").await,
            LineOutcome::Skipped(ParseError::NotANumber { .. })
        ));
        assert_eq!(
            dispatcher.process_line("# note|1|1.2.3.4:514").await,
            LineOutcome::Comment
        );
        assert!(matches!(
            dispatcher.process_line("   ").await,
            LineOutcome::Skipped(ParseError::MalformedLine { .. })
        ));

        assert!(dispatcher.forwarder().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_lines_do_not_wait() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(false));
        let start = Instant::now();
        dispatcher.process_line("30|msg|999.999.999.999:514").await;
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn forward_failure_is_not_fatal() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(true));
        let summary = dispatcher
            .replay(["0|first|10.0.0.1:514", "0|second|10.0.0.1:514"])
            .await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.forwarded, 0);
        assert_eq!(dispatcher.forwarder().calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delays_accumulate_in_order() {
        let dispatcher = Dispatcher::new(RecordingForwarder::new(false));
        let summary = dispatcher
            .replay([
                "# scenario",
                "1|one|10.0.0.1:514",
                "bad line",
                "2|%ASA-4-106023: Deny tcp src outside:1.1.1.1/1|10.0.0.1:514",
                "",
                "0.5|three|10.0.0.1:514",
            ])
            .await;

        assert_eq!(
            summary,
            ReplaySummary {
                lines: 6,
                comments: 1,
                skipped: 2,
                forwarded: 3,
                failed: 0,
            }
        );

        let calls = dispatcher.forwarder().calls();
        let times: Vec<Duration> = calls.iter().map(|c| c.0).collect();
        assert!(times[0] >= Duration::from_secs(1));
        assert!(times[1] >= Duration::from_secs(3));
        assert!(times[2] >= Duration::from_millis(3500));
        assert_eq!(calls[1].2, "%ASA-4-106023");
        assert_eq!(calls[1].3, "\" Deny tcp src outside:1.1.1.1/1\"");
        assert_eq!(calls[2].3, "\"three\"");
    }
}
