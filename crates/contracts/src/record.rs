//! FormattedRecord - the rendered log entry handed to sinks

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Upper-case label, e.g. `"WARN"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError(String);

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity '{}'", self.0)
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// A fully rendered log entry.
///
/// Produced upstream once per log call and immutable afterwards. Sinks only
/// borrow it for the duration of a single `append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRecord {
    severity: Severity,
    timestamp: SystemTime,
    logger_name: String,
    payload: Bytes,
}

impl FormattedRecord {
    /// Create a record stamped with the current time
    pub fn new(
        severity: Severity,
        logger_name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::with_timestamp(severity, SystemTime::now(), logger_name, payload)
    }

    /// Create a record with an explicit timestamp
    pub fn with_timestamp(
        severity: Severity,
        timestamp: SystemTime,
        logger_name: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            severity,
            timestamp,
            logger_name: logger_name.into(),
            payload: payload.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    /// Rendered bytes, including any trailing newline added by the layout
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload decoded as UTF-8
    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }
}
