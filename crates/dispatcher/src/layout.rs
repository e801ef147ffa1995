//! Layouts - render an event into the bytes a sink writes
//!
//! Output is always UTF-8.

use std::fmt::Write as _;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use contracts::{FormattedRecord, LayoutKind, Severity};

/// Everything a layout may render
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub severity: Severity,
    pub timestamp: SystemTime,
    pub logger_name: &'a str,
    pub message: &'a str,
    /// Structured key/value pairs in emission order
    pub fields: &'a [(&'a str, String)],
}

impl<'a> LayoutInput<'a> {
    pub fn new(severity: Severity, logger_name: &'a str, message: &'a str) -> Self {
        Self {
            severity,
            timestamp: SystemTime::now(),
            logger_name,
            message,
            fields: &[],
        }
    }

    pub fn with_fields(self, fields: &'a [(&'a str, String)]) -> Self {
        Self { fields, ..self }
    }

    pub fn with_timestamp(self, timestamp: SystemTime) -> Self {
        Self { timestamp, ..self }
    }

    /// Render with `layout` into an immutable record
    pub fn to_record(&self, layout: &dyn Layout) -> FormattedRecord {
        FormattedRecord::with_timestamp(
            self.severity,
            self.timestamp,
            self.logger_name,
            layout.format(self),
        )
    }
}

pub trait Layout: Send + Sync {
    fn format(&self, input: &LayoutInput<'_>) -> Bytes;
}

/// The message followed by a newline
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageLayout;

impl Layout for MessageLayout {
    fn format(&self, input: &LayoutInput<'_>) -> Bytes {
        let mut out = String::with_capacity(input.message.len() + 1);
        out.push_str(input.message);
        out.push('\n');
        Bytes::from(out)
    }
}

/// `2025-01-31T08:15:00.123Z INFO  app::db: message key=value`
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailedLayout;

impl Layout for DetailedLayout {
    fn format(&self, input: &LayoutInput<'_>) -> Bytes {
        let time: DateTime<Utc> = input.timestamp.into();
        let mut out = String::with_capacity(64 + input.message.len());

        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{} {:<5} {}: {}",
            time.to_rfc3339_opts(SecondsFormat::Millis, true),
            input.severity.as_str(),
            input.logger_name,
            input.message
        );
        for (key, value) in input.fields {
            let _ = write!(out, " {key}={value}");
        }
        out.push('\n');
        Bytes::from(out)
    }
}

/// Layout selected by configuration
pub fn layout_for(kind: LayoutKind) -> Box<dyn Layout> {
    match kind {
        LayoutKind::Message => Box::new(MessageLayout),
        LayoutKind::Detailed => Box::new(DetailedLayout),
    }
}
