use std::fmt;

use chrono::{
    DateTime,
    Utc,
};
use kr_core::k8s::LogStream;
use kr_core::prelude::*;
use tracing::*;

// Items gathered for a report, plus a note for every source we couldn't read.  A missing log
// stream or a failed event query never fails the report as a whole.
#[derive(Clone, Debug)]
pub struct Trail<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
}

impl<T> Default for Trail<T> {
    fn default() -> Self {
        Trail { items: vec![], warnings: vec![] }
    }
}

impl<T> Trail<T> {
    pub fn warn(&mut self, msg: String) {
        warn!("{msg}");
        self.warnings.push(msg);
    }

    pub fn append(&mut self, mut other: Trail<T>) {
        self.items.append(&mut other.items);
        self.warnings.append(&mut other.warnings);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceEvent {
    pub involved: ResourceIdentity,
    pub type_: String,
    pub reason: String,
    pub message: String,
    pub count: i32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ResourceEvent {
    pub fn new(involved: &ResourceIdentity, evt: &corev1::Event) -> ResourceEvent {
        // Newer (events.k8s.io-style) events only fill in eventTime and the series fields
        let event_time = evt.event_time.as_ref().map(|t| t.0);
        let series = evt.series.as_ref();
        ResourceEvent {
            involved: involved.clone(),
            type_: evt.type_.clone().unwrap_or_default(),
            reason: evt.reason.clone().unwrap_or_default(),
            message: evt.message.clone().unwrap_or_default(),
            count: evt.count.or(series.and_then(|s| s.count)).unwrap_or(1),
            first_seen: evt
                .first_timestamp
                .as_ref()
                .map(|t| t.0)
                .or(event_time)
                .or(evt.metadata.creation_timestamp.as_ref().map(|t| t.0)),
            last_seen: evt
                .last_timestamp
                .as_ref()
                .map(|t| t.0)
                .or(series.and_then(|s| s.last_observed_time.as_ref()).map(|t| t.0))
                .or(event_time),
        }
    }
}

impl fmt::Display for ResourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} on {}: {}", self.type_, self.reason, self.involved, self.message)?;
        if self.count > 1 {
            write!(f, " (x{}", self.count)?;
            if let (Some(first), Some(last)) = (self.first_seen, self.last_seen) {
                write!(f, " between {} and {}", fmt_ts(first), fmt_ts(last))?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogLine {
    pub resource: ResourceIdentity,
    pub container: String,
    pub previous: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let instance = if self.previous { " (previous)" } else { "" };
        let ts = self.timestamp.map(fmt_ts).unwrap_or_else(|| "-".into());
        write!(f, "[{} {}{instance}] {ts} {}", self.resource, self.container, self.message)
    }
}

/// Split the output of a timestamped log request into lines.
///
/// The apiserver prefixes each line with an RFC 3339 timestamp and a space.  Lines that don't
/// start with one (for example, progress output that rewrites itself with carriage returns ends up
/// glued onto whatever came before) keep the whole raw line as the message and reuse the timestamp
/// of the last line that did parse.
pub fn parse_log_lines(resource: &ResourceIdentity, stream: &LogStream, text: &str) -> Vec<LogLine> {
    let mut last_ts = None;
    text.lines()
        .map(|line| {
            let parsed = line
                .split_once(' ')
                .and_then(|(ts, msg)| DateTime::parse_from_rfc3339(ts).ok().map(|ts| (ts.with_timezone(&Utc), msg)));

            let (timestamp, message) = match parsed {
                Some((ts, msg)) => {
                    last_ts = Some(ts);
                    (Some(ts), msg.to_string())
                },
                None => (last_ts, line.to_string()),
            };

            LogLine {
                resource: resource.clone(),
                container: stream.container.clone(),
                previous: stream.previous,
                timestamp,
                message,
            }
        })
        .collect()
}

/// Everything we could find out about one resource that didn't become ready.
#[derive(Clone, Debug)]
pub struct ResourceDiagnostics {
    pub identity: ResourceIdentity,
    pub events: Vec<ResourceEvent>,
    pub logs: Vec<LogLine>,
    pub warnings: Vec<String>,
}

impl fmt::Display for ResourceDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} is not ready", self.identity)?;

        writeln!(f, "  Events:")?;
        if self.events.is_empty() {
            writeln!(f, "    <none>")?;
        }
        for evt in &self.events {
            writeln!(f, "    {evt}")?;
        }

        writeln!(f, "  Logs:")?;
        if self.logs.is_empty() {
            writeln!(f, "    <none>")?;
        }
        for line in &self.logs {
            writeln!(f, "    {line}")?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for w in &self.warnings {
                writeln!(f, "    {w}")?;
            }
        }
        Ok(())
    }
}

/// The diagnostic report for the last set of resources that were seen to be not ready, in the
/// order they were evaluated in.
#[derive(Clone, Debug, Default)]
pub struct WaitReport {
    pub resources: Vec<ResourceDiagnostics>,
}

impl WaitReport {
    pub fn identities(&self) -> Vec<&ResourceIdentity> {
        self.resources.iter().map(|r| &r.identity).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Display for WaitReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, res) in self.resources.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{res}")?;
        }
        Ok(())
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
